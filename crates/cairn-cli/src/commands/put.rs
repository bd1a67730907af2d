//! Put command implementation

use anyhow::{Context, Result};
use cairn::prelude::*;
use serde_json::Value;
use std::path::PathBuf;

pub fn execute(
    env: &LmdbEnvironment,
    store: &str,
    key: &str,
    json: &str,
    attachment: Option<PathBuf>,
) -> Result<()> {
    let value: Value = serde_json::from_str(json).context("Value is not valid JSON")?;
    let attachment = attachment
        .map(|path| {
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))
        })
        .transpose()?;

    let store = env.store(store)?;
    store.put(key.as_bytes(), &value, attachment.as_deref())?;
    println!("✓ Stored '{}' in '{}'", key, store.name());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_with_attachment_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let registry = EnvironmentRegistry::new();
        let env = super::super::open_env(&registry, temp_dir.path().join("env"), 4).unwrap();
        let file = temp_dir.path().join("blob.bin");
        std::fs::write(&file, [1u8, 2, 3]).unwrap();

        execute(&env, "files", "blob", r#"{"size":3}"#, Some(file)).unwrap();

        let record = env.store("files").unwrap().get(b"blob").unwrap();
        assert_eq!(record.value["size"], 3);
        assert_eq!(record.attachment, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_put_rejects_bad_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let registry = EnvironmentRegistry::new();
        let env = super::super::open_env(&registry, temp_dir.path().to_path_buf(), 4).unwrap();
        assert!(execute(&env, "files", "k", "{not json", None).is_err());
    }
}
