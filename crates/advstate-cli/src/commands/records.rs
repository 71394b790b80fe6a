use std::path::Path;

use advstate_storage::{RedbArea, StorageArea};
use anyhow::Context;

fn open(db: &str) -> anyhow::Result<RedbArea> {
    RedbArea::open(Path::new(db)).with_context(|| format!("opening {db}"))
}

pub fn list(db: &str) -> anyhow::Result<()> {
    let area = open(db)?;
    let keys = area.keys()?;
    for key in &keys {
        if let Some(value) = area.get(key)? {
            println!("{key} = {value}");
        }
    }
    tracing::info!(count = keys.len(), "listed records");
    Ok(())
}

pub fn get(db: &str, key: &str) -> anyhow::Result<()> {
    let area = open(db)?;
    match area.get(key)? {
        Some(value) => {
            println!("{value}");
            Ok(())
        }
        None => anyhow::bail!("no record at {key}"),
    }
}

pub fn set(db: &str, key: &str, value: &str) -> anyhow::Result<()> {
    let parsed: serde_json::Value =
        serde_json::from_str(value).with_context(|| format!("value for {key} is not valid JSON"))?;
    let area = open(db)?;
    area.set(key, &serde_json::to_string(&parsed)?)?;
    println!("✓ Stored {key}");
    Ok(())
}

pub fn remove(db: &str, key: &str) -> anyhow::Result<()> {
    let area = open(db)?;
    if area.remove(key)? {
        println!("✓ Removed {key}");
    } else {
        println!("No record at {key}");
    }
    Ok(())
}
