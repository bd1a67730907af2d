//! Stats command implementation

use anyhow::{Context, Result};
use cairn::prelude::*;

pub fn execute(env: &LmdbEnvironment, store: Option<&str>) -> Result<()> {
    tracing::debug!("Collecting stats for {}", env.path().display());

    let names = match store {
        Some(name) => vec![name.to_string()],
        None => env.store_names().context("Failed to list stores")?,
    };

    println!("Environment: {}", env.path().display());
    println!(
        "Limits: {} stores, {} bytes",
        env.config().max_sub_stores,
        env.config().max_size_bytes
    );

    if names.is_empty() {
        println!("No stores");
        return Ok(());
    }

    println!("{}", "=".repeat(40));
    let mut total = 0;
    for name in &names {
        let store = env
            .store(name)
            .with_context(|| format!("Failed to open store '{}'", name))?;
        let count = store.count()?;
        total += count;
        println!("{:<30} {:>9}", name, count);
    }
    if names.len() > 1 {
        println!("{}", "-".repeat(40));
        println!("{:<30} {:>9}", "total", total);
    }

    Ok(())
}
