mod cli;
mod db;
mod error;
mod fetcher;
mod fmt;
mod models;
mod parser;
mod reconciler;
mod settings;
mod sync;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{AccountsCommands, Cli, Commands};

fn init_logging(verbose: bool) {
    let default = if verbose { "info,alertsync=debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Accounts { command } => match command {
            AccountsCommands::Add {
                name,
                mailbox,
                timezone,
            } => cli::accounts::add(&name, &mailbox, &timezone),
            AccountsCommands::List => cli::accounts::list(),
        },
        Commands::Sync {
            account,
            timezone,
            dry_run,
            bootstrap,
            boundary,
            mailbox_file,
        } => cli::sync::run(
            &account,
            timezone.as_deref(),
            dry_run,
            bootstrap,
            boundary,
            mailbox_file.as_deref(),
        ),
        Commands::Seed {
            account,
            date,
            vendor,
            amount,
        } => cli::seed::run(&account, &date, &vendor, &amount),
        Commands::History { account, limit } => cli::history::run(&account, limit),
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
