//! Keys command implementation

use anyhow::Result;
use cairn::prelude::*;

use super::render_key;

pub fn execute(
    env: &LmdbEnvironment,
    store: &str,
    start: Option<usize>,
    end: Option<usize>,
) -> Result<()> {
    let store = env.store(store)?;
    for key in store.keys(start, end)? {
        println!("{}", render_key(&key));
    }
    Ok(())
}
