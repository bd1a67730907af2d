//! Batched Writes Example
//!
//! Shows a write batch spanning two stores, a rolled-back batch, and
//! `with_store` for scoped single-store work.
//!
//! Run with: cargo run --example batch_writes

use cairn::prelude::*;
use serde_json::json;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("cairn_lmdb=debug")
        .init();

    let temp_dir = tempfile::tempdir()?;
    let registry = EnvironmentRegistry::new();
    let env = registry.open(EnvironmentConfig::new(temp_dir.path(), 4))?;

    let orders = env.store("orders")?;
    let stock = env.store("stock")?;
    stock.put(b"widget", &json!({ "on_hand": 10 }), None)?;

    // Both writes land in one commit.
    let batch = env.batch()?;
    orders.put(b"order-1", &json!({ "sku": "widget", "qty": 3 }), None)?;
    stock.put(b"widget", &json!({ "on_hand": 7 }), None)?;
    batch.commit()?;
    println!("after commit: on_hand = {}", stock.get(b"widget")?.value["on_hand"]);

    // Aborted batches leave nothing behind.
    let batch = env.batch()?;
    orders.put(b"order-2", &json!({ "sku": "widget", "qty": 100 }), None)?;
    batch.abort()?;
    println!("orders after abort: {}", orders.count()?);

    // An error inside with_store rolls the whole closure back.
    let outcome = env.with_store("orders", |store| {
        store.put(b"order-3", &json!({ "sku": "gadget", "qty": 1 }), None)?;
        Err::<(), _>(CairnError::Other(anyhow::anyhow!("gadget is out of stock")))
    });
    println!("with_store failed: {}", outcome.is_err());
    println!("orders now: {}", orders.count()?);

    let stats = env.write_stats()?;
    println!(
        "write txns: begun {}, committed {}, aborted {}",
        stats.begun, stats.committed, stats.aborted
    );

    registry.close_all()?;
    Ok(())
}
