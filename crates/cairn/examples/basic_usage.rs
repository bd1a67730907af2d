//! Basic Cairn Usage Example
//!
//! This example demonstrates:
//! - Opening an environment through the registry
//! - Writing and reading records
//! - Slicing keys and iterating entries
//! - Filtering with values
//!
//! Run with: cargo run --example basic_usage

use cairn::prelude::*;
use serde_json::json;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("cairn=debug,cairn_lmdb=debug")
        .init();

    let temp_dir = tempfile::tempdir()?;
    let registry = EnvironmentRegistry::new();
    let env = registry.open(EnvironmentConfig::new(temp_dir.path().join("basic"), 4))?;
    println!("Opened environment at {}", env.path().display());

    let people = env.store("people")?;
    let batch = people.batch()?;
    for (id, name, city) in [
        ("p1", "Ada", "London"),
        ("p2", "Grace", "New York"),
        ("p3", "Edsger", "Rotterdam"),
        ("p4", "Barbara", "Boston"),
    ] {
        people.put(id.as_bytes(), &json!({ "name": name, "city": city }), None)?;
    }
    batch.commit()?;
    println!("Stored {} people", people.count()?);

    let ada = people.get(b"p1")?;
    println!("p1 -> {}", ada.value);

    let middle = people.keys(Some(1), Some(3))?;
    for key in middle {
        println!("slice key: {}", String::from_utf8_lossy(&key));
    }

    for entry in people.iterate(None, None)? {
        let record = entry.fetch()?;
        println!("{} => {}", String::from_utf8_lossy(&entry.key), record.value["name"]);
    }

    let americans = people.filter_records(|_, record, _| {
        matches!(record.value["city"].as_str(), Some("New York" | "Boston"))
    })?;
    println!("{} people live in the US", americans.len());

    let removed = people.remove(b"p3")?;
    println!("Removed {}", removed.value["name"]);

    registry.close_all()?;
    Ok(())
}
