//! Bookmark command implementations.

use colored::Colorize;
use serde::Serialize;

use crate::cli::commands::with_store;
use crate::cli::{AddArgs, Cli, EditArgs};
use crate::error::{Error, Result};
use crate::model::Bookmark;
use crate::validate::parse_tag_list;

/// Output for add.
#[derive(Serialize)]
struct AddOutput<'a> {
    id: i64,
    bookmark: &'a Bookmark,
}

/// Output for search and list.
#[derive(Serialize)]
struct ListOutput<'a> {
    items: &'a [Bookmark],
    count: usize,
}

/// Output for edit.
#[derive(Serialize)]
struct EditOutput<'a> {
    updated: usize,
    bookmark: &'a Bookmark,
}

/// Output for delete.
#[derive(Serialize)]
struct DeleteOutput<'a> {
    url: &'a str,
    deleted: usize,
}

/// Execute the add command.
///
/// # Errors
///
/// Returns an error if the bookmark is invalid or cannot be stored.
pub fn execute_add(args: &AddArgs, cli: &Cli) -> Result<()> {
    let bookmark = Bookmark {
        url: args.url.clone(),
        title: args.title.clone().unwrap_or_default(),
        description: args.description.clone().unwrap_or_default(),
        tags: args.tags.as_deref().map(parse_tag_list).unwrap_or_default(),
    };

    let id = with_store(cli, |store| store.insert(&bookmark))?;

    if cli.json {
        let output = AddOutput {
            id,
            bookmark: &bookmark,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if !cli.quiet {
        println!("{} {}", "Added".green(), bookmark.url);
    }
    Ok(())
}

/// Execute the search command.
///
/// # Errors
///
/// Returns `Error::InvalidArgument` for an empty query.
pub fn execute_search(query: &[String], limit: Option<usize>, cli: &Cli) -> Result<()> {
    let query = query.join(" ");
    let mut results = with_store(cli, |store| store.search(&query))?;
    if let Some(limit) = limit {
        results.truncate(limit);
    }

    if cli.json {
        print_json_list(&results)
    } else {
        if results.is_empty() {
            println!("{}", "No bookmarks found.".dimmed());
        }
        for bookmark in &results {
            print_bookmark(bookmark);
        }
        Ok(())
    }
}

/// Execute the get command.
///
/// # Errors
///
/// Returns a not-found error (with close matches) if the URL is unknown.
pub fn execute_get(url: &str, cli: &Cli) -> Result<()> {
    let bookmark = with_store(cli, |store| {
        store.get_by_url(url)?.ok_or_else(|| {
            store.with_suggestions(Error::BookmarkNotFound {
                url: url.to_string(),
            })
        })
    })?;

    if cli.json {
        println!("{}", serde_json::to_string(&bookmark)?);
    } else {
        print_bookmark(&bookmark);
    }
    Ok(())
}

/// Execute the list command.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn execute_list(limit: Option<usize>, cli: &Cli) -> Result<()> {
    let mut bookmarks = with_store(cli, |store| store.list())?;
    if let Some(limit) = limit {
        bookmarks.truncate(limit);
    }

    if cli.json {
        print_json_list(&bookmarks)
    } else {
        if bookmarks.is_empty() {
            println!("{}", "No bookmarks yet.".dimmed());
        }
        for bookmark in &bookmarks {
            print_bookmark(bookmark);
        }
        Ok(())
    }
}

/// Execute the edit command.
///
/// # Errors
///
/// Returns a not-found error if no bookmark has the URL.
pub fn execute_edit(args: &EditArgs, cli: &Cli) -> Result<()> {
    let (updated, bookmark) = with_store(cli, |store| {
        let current = store.get_by_url(&args.url)?.ok_or_else(|| {
            store.with_suggestions(Error::BookmarkNotFound {
                url: args.url.clone(),
            })
        })?;
        let edited = apply_edits(current, args);
        let updated = store.update(&args.url, &edited)?;
        Ok((updated, edited))
    })?;

    if cli.json {
        let output = EditOutput {
            updated,
            bookmark: &bookmark,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else if !cli.quiet {
        println!("{} {}", "Updated".green(), bookmark.url);
    }
    Ok(())
}

/// Execute the delete command.
///
/// # Errors
///
/// Returns a not-found error if no bookmark has the URL.
pub fn execute_delete(url: &str, cli: &Cli) -> Result<()> {
    let deleted = with_store(cli, |store| store.delete(url))?;

    if cli.json {
        let output = DeleteOutput { url, deleted };
        println!("{}", serde_json::to_string(&output)?);
    } else if !cli.quiet {
        println!("{} {url}", "Deleted".red());
    }
    Ok(())
}

/// Overlay the fields given on the command line onto the current bookmark.
fn apply_edits(current: Bookmark, args: &EditArgs) -> Bookmark {
    Bookmark {
        url: args.new_url.clone().unwrap_or(current.url),
        title: args.title.clone().unwrap_or(current.title),
        description: args.description.clone().unwrap_or(current.description),
        tags: args
            .tags
            .as_deref()
            .map_or(current.tags, parse_tag_list),
    }
}

fn print_json_list(bookmarks: &[Bookmark]) -> Result<()> {
    let output = ListOutput {
        items: bookmarks,
        count: bookmarks.len(),
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn print_bookmark(bookmark: &Bookmark) {
    println!("{}", bookmark.url.cyan().bold());
    if !bookmark.title.is_empty() {
        println!("  {}", bookmark.title);
    }
    if !bookmark.description.is_empty() {
        println!("  {}", bookmark.description.dimmed());
    }
    if !bookmark.tags.is_empty() {
        println!("  {}", format!("[{}]", bookmark.tags.join(", ")).yellow());
    }
}
