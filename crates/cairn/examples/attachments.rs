//! Attachments Example
//!
//! Stores JSON metadata next to raw bytes and reads both back through a
//! typed store.
//!
//! Run with: cargo run --example attachments

use cairn::prelude::*;

#[derive(Debug, Serialize, Deserialize)]
struct Image {
    file_name: String,
    width: u32,
    height: u32,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("cairn_lmdb=info")
        .init();

    let temp_dir = tempfile::tempdir()?;
    let registry = EnvironmentRegistry::new();
    let env = registry.open(EnvironmentConfig::new(temp_dir.path(), 2))?;
    let images: TypedStore<Image> = TypedStore::open(&env, "images")?;

    let pixels: Vec<u8> = (0..64u8).flat_map(|v| [v, v, v, 255]).collect();
    images.put_with_attachment(
        b"checker.raw",
        &Image {
            file_name: "checker.raw".into(),
            width: 8,
            height: 8,
        },
        &pixels,
    )?;
    images.put(
        b"missing.raw",
        &Image {
            file_name: "missing.raw".into(),
            width: 0,
            height: 0,
        },
    )?;

    for (key, image) in images.values(None, None)? {
        let (_, bytes) = images.get_with_attachment(&key)?;
        println!(
            "{:?}: {}x{}, {} attachment bytes",
            image.file_name,
            image.width,
            image.height,
            bytes.map_or(0, |b| b.len())
        );
    }

    registry.close_all()?;
    Ok(())
}
