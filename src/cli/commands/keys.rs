//! Access key command implementations.
//!
//! Keys are local to this host and never travel through the change
//! directory.

use colored::Colorize;
use serde::Serialize;

use crate::cli::commands::with_store;
use crate::cli::{Cli, KeysCommands};
use crate::error::Result;

#[derive(Serialize)]
struct KeyOutput<'a> {
    key: &'a str,
}

#[derive(Serialize)]
struct KeyListOutput<'a> {
    keys: &'a [String],
    count: usize,
}

/// Execute key commands.
///
/// # Errors
///
/// Returns an error if the key store operation fails.
pub fn execute(command: &KeysCommands, cli: &Cli) -> Result<()> {
    match command {
        KeysCommands::New => {
            let key = with_store(cli, |store| store.new_key())?;
            print_key(&key, cli.json)
        }
        KeysCommands::Add { key } => {
            with_store(cli, |store| store.add_key(key))?;
            if cli.json {
                println!("{}", serde_json::to_string(&KeyOutput { key })?);
            } else if !cli.quiet {
                println!("{}", "Key added.".green());
            }
            Ok(())
        }
        KeysCommands::List => {
            let keys = with_store(cli, |store| store.list_keys())?;
            if cli.json {
                let output = KeyListOutput {
                    keys: &keys,
                    count: keys.len(),
                };
                println!("{}", serde_json::to_string(&output)?);
            } else if keys.is_empty() {
                println!("{}", "No keys.".dimmed());
            } else {
                for key in &keys {
                    println!("{key}");
                }
            }
            Ok(())
        }
        KeysCommands::Delete { key } => {
            with_store(cli, |store| store.delete_key(key))?;
            if cli.json {
                println!("{}", serde_json::to_string(&KeyOutput { key })?);
            } else if !cli.quiet {
                println!("{}", "Key deleted.".red());
            }
            Ok(())
        }
    }
}

fn print_key(key: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(&KeyOutput { key })?);
    } else {
        println!("{key}");
    }
    Ok(())
}
