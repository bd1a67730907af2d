//! Get command implementation

use anyhow::{Context, Result};
use cairn::prelude::*;
use std::path::PathBuf;

pub fn execute(
    env: &LmdbEnvironment,
    store: &str,
    key: &str,
    attachment_out: Option<PathBuf>,
) -> Result<()> {
    let store = env.store(store)?;
    let record = store.get(key.as_bytes())?;
    println!("{}", serde_json::to_string_pretty(&record.value)?);

    match (record.attachment, attachment_out) {
        (Some(bytes), Some(path)) => {
            std::fs::write(&path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {} attachment bytes to {}", bytes.len(), path.display());
        }
        (Some(bytes), None) => eprintln!("({} attachment bytes)", bytes.len()),
        (None, Some(_)) => eprintln!("(no attachment)"),
        (None, None) => {}
    }
    Ok(())
}
