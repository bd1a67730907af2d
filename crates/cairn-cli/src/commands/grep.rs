//! Grep command implementation

use anyhow::Result;
use cairn::prelude::*;

use super::render_key;

/// Entries whose key (or, with `values`, JSON text) contains `pattern`
///
/// The scan stops as soon as `limit` matches are found.
pub fn search(
    store: &LmdbStore,
    pattern: &str,
    values: bool,
    limit: Option<usize>,
) -> Result<Vec<FilterMatch>> {
    if limit == Some(0) {
        return Ok(Vec::new());
    }
    let needle = pattern.as_bytes();
    let mut found = 0;
    let matches = store.filter(values, |key, record, ctx| {
        let hit = contains(key, needle)
            || record.is_some_and(|r| r.value.to_string().contains(pattern));
        if hit {
            found += 1;
            ctx.stop = limit.is_some_and(|limit| found >= limit);
        }
        hit
    })?;
    Ok(matches)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|w| w == needle)
}

pub fn execute(
    env: &LmdbEnvironment,
    store: &str,
    pattern: &str,
    values: bool,
    limit: Option<usize>,
) -> Result<()> {
    let store = env.store(store)?;
    let matches = search(&store, pattern, values, limit)?;
    for m in &matches {
        match &m.record {
            Some(record) => println!("{}\t{}", render_key(&m.key), record.value),
            None => println!("{}", render_key(&m.key)),
        }
    }
    eprintln!("{} match(es)", matches.len());
    Ok(())
}
