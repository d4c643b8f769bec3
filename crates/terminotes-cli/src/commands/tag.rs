//! Tag command handlers

use anyhow::Result;

use terminotes_core::Store;

use crate::output::Output;

/// Remove tags no note uses any more
pub fn prune(store: &mut Store, output: &Output) -> Result<()> {
    let removed = store.prune_tags()?;
    if removed == 0 {
        output.message("No unused tags.");
    } else {
        output.success(&format!("Removed {} unused tag(s)", removed));
    }
    Ok(())
}
