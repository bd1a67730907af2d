//! Drop command implementation

use anyhow::Result;
use cairn::prelude::*;

pub fn execute(env: &LmdbEnvironment, store: &str, yes: bool) -> Result<()> {
    let store = env.store(store)?;
    let count = store.count()?;

    if store.drop_all(|| yes)? {
        println!("✓ Dropped {} entries from '{}'", count, store.name());
    } else {
        println!(
            "Refusing to drop {} entries from '{}' without --yes",
            count,
            store.name()
        );
    }
    Ok(())
}
