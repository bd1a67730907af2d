pub mod drop;
pub mod get;
pub mod grep;
pub mod keys;
pub mod put;
pub mod remove;
pub mod stats;

use anyhow::{Context, Result};
use cairn::{EnvironmentConfig, EnvironmentRegistry, LmdbEnvironment};
use std::path::PathBuf;

pub fn open_env(
    registry: &EnvironmentRegistry,
    env_path: PathBuf,
    max_stores: u32,
) -> Result<LmdbEnvironment> {
    let config = EnvironmentConfig::new(&env_path, max_stores);
    registry
        .open(config)
        .with_context(|| format!("Failed to open environment at {}", env_path.display()))
}

/// Printable form of a key: UTF-8 when possible, hex otherwise
pub fn render_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => {
            let hex: String = key.iter().map(|b| format!("{:02x}", b)).collect();
            format!("0x{}", hex)
        }
    }
}
