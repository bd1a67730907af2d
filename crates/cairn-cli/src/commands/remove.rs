//! Remove command implementation

use anyhow::Result;
use cairn::prelude::*;

pub fn execute(env: &LmdbEnvironment, store: &str, key: &str) -> Result<()> {
    let store = env.store(store)?;
    let removed = store.remove(key.as_bytes())?;
    println!("{}", serde_json::to_string_pretty(&removed.value)?);
    eprintln!("✓ Removed '{}' from '{}'", key, store.name());
    Ok(())
}
