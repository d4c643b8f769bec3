//! Info command handler

use anyhow::Result;

use terminotes_core::Store;

use crate::output::{Output, StoreInfo, TagCount};

/// Gather database, tag and sync details
pub fn collect(store: &mut Store) -> Result<StoreInfo> {
    let tags = store
        .tags_with_counts()?
        .into_iter()
        .map(|(name, count)| TagCount { name, count })
        .collect();

    Ok(StoreInfo {
        database: store.database_path().display().to_string(),
        notes: store.count_notes()?,
        tags,
        sync: store.sync_status()?,
    })
}

/// Show status information
pub fn show(store: &mut Store, output: &Output) -> Result<()> {
    let info = collect(store)?;
    output.print_info(&info);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::local_store;
    use tempfile::TempDir;
    use terminotes_core::NoteDraft;

    #[test]
    fn test_collect_counts_notes_and_tags() {
        let temp = TempDir::new().unwrap();
        let mut store = local_store(&temp);
        store
            .create_note(NoteDraft {
                tags: vec!["a".to_string(), "b".to_string()],
                ..NoteDraft::new("t", "")
            })
            .unwrap();

        let info = collect(&mut store).unwrap();
        assert_eq!(info.notes, 1);
        assert_eq!(info.tags.len(), 2);
        assert_eq!(info.sync.backend, "none");
        assert!(info.database.ends_with("terminotes.sqlite3"));
    }
}
