use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use taskflow_core::paths::MASTER_TAG;
use taskflow_core::store::Store;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let store = Store::init(root).context("failed to initialize taskflow")?;
    let current = store.current_tag()?;

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "current_tag": current,
        }))?;
    } else {
        println!("Initialized .taskflow/ (current tag: {MASTER_TAG})");
    }
    Ok(())
}
