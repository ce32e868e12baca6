//! Sync command implementations.
//!
//! Every command already imports on open and exports on close; `sync run`
//! does nothing else, which makes it the explicit way to exchange changes.

use colored::Colorize;

use crate::cli::commands::{resolve_config, with_store};
use crate::cli::{Cli, SyncCommands};
use crate::error::Result;
use crate::store::BookmarkStore;
use crate::sync::print_status;

/// Execute sync commands.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, read or closed.
pub fn execute(command: &SyncCommands, cli: &Cli) -> Result<()> {
    match command {
        SyncCommands::Run => run(cli),
        SyncCommands::Status => status(cli),
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let store = BookmarkStore::open(&config)?;
    let import = store.last_import().clone();
    let export = store.close()?;

    if cli.json {
        let output = serde_json::json!({
            "success": true,
            "host": config.host_id,
            "changes_dir": config.changes_dir.display().to_string(),
            "import": import,
            "export": export,
        });
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    if cli.quiet {
        return Ok(());
    }

    println!("Sync complete for: {}", config.host_id);
    println!();
    if import.peers.is_empty() {
        println!("{}", "No peer change files.".dimmed());
    }
    for peer in &import.peers {
        println!(
            "  {:<20} {} applied, {} ignored, {} already seen",
            peer.host_id, peer.applied, peer.ignored, peer.already_seen
        );
    }
    for host in &import.corrupt_peers {
        println!("  {:<20} {}", host, "corrupt, skipped".red());
    }
    println!();
    if export.written {
        println!(
            "  Exported {} records ({} bytes) to {}",
            export.records,
            export.bytes,
            config.changes_dir.join(&config.host_id).display()
        );
    } else {
        println!("  {}", "Change file already up to date.".green());
    }
    Ok(())
}

fn status(cli: &Cli) -> Result<()> {
    let status = with_store(cli, |store| store.sync_status())?;

    if cli.json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}
