//! mark CLI entry point.

use clap::Parser;
use mark::cli::commands;
use mark::cli::{Cli, Commands};
use mark::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    // Set up tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.json {
                eprintln!("{}", e.to_structured_json());
            } else if let Some(hint) = e.hint() {
                eprintln!("Error: {e}\n  Hint: {hint}");
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    if quiet {
        return;
    }

    // Honor RUST_LOG if set, otherwise use verbosity flag
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("info"),
            2 => EnvFilter::new("debug,rusqlite=info"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: &Cli) -> Result<(), Error> {
    match &cli.command {
        // Bookmarks
        Commands::Add(args) => commands::bookmark::execute_add(args, cli),
        Commands::Search { query, limit } => {
            commands::bookmark::execute_search(query, *limit, cli)
        }
        Commands::Get { url } => commands::bookmark::execute_get(url, cli),
        Commands::List { limit } => commands::bookmark::execute_list(*limit, cli),
        Commands::Edit(args) => commands::bookmark::execute_edit(args, cli),
        Commands::Delete { url } => commands::bookmark::execute_delete(url, cli),

        // Keys
        Commands::Keys { command } => commands::keys::execute(command, cli),

        // Sync
        Commands::Sync { command } => commands::sync::execute(command, cli),

        Commands::Version => commands::version::execute(cli.json),

        // Shell completions
        Commands::Completions { shell } => commands::completions::execute(shell),
    }
}
