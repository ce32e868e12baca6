//! Version command implementation.

use serde::Serialize;

use crate::error::Result;
use crate::storage::schema::CURRENT_SCHEMA_VERSION;
use crate::sync::codec::FORMAT_VERSION;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    changelog_format: u32,
    schema: i32,
}

/// Print the crate version with the on-disk format versions it speaks.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let output = VersionOutput {
        version: env!("CARGO_PKG_VERSION"),
        changelog_format: FORMAT_VERSION,
        schema: CURRENT_SCHEMA_VERSION,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!(
            "mark {} (change log v{}, schema v{})",
            output.version, output.changelog_format, output.schema
        );
    }
    Ok(())
}
