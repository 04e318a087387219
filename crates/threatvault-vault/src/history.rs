//! Bounded history of prior document versions.
//!
//! Before a document is overwritten its current sealed bytes are copied,
//! untouched, to `<model>/history/<name>`. Names are
//! `"<YYYY-MM-DD HH:MM:SS>.<nnnnnn> <reason>.backup"` in UTC; the six-digit
//! ordinal counts entries within the same second, so byte order of the names
//! is chronological order. After each copy the oldest entries beyond the
//! retention bound are deleted.
//!
//! Callers must hold the resource lock for the model.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use threatvault_store::{BlobStore, InsertResult};

use crate::error::Result;

/// Sub-namespace holding backups.
pub const HISTORY_DIR: &str = "history";

/// Suffix of every backup entry.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Longest reason kept in an entry name, in UTF-8 bytes. With the 27-byte
/// stamp, a space and the suffix, names stay within a 255-byte file name.
const MAX_REASON_BYTES: usize = 200;

const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Copies documents aside before overwrite and prunes old copies.
pub struct HistoryArchive<S: BlobStore> {
    store: Arc<S>,
    retention: usize,
}

impl<S: BlobStore> HistoryArchive<S> {
    /// Create an archive keeping at most `retention` entries per model.
    pub fn new(store: Arc<S>, retention: usize) -> Self {
        Self { store, retention }
    }

    /// The retention bound.
    pub fn retention(&self) -> usize {
        self.retention
    }

    /// Storage prefix of a model's history.
    pub fn prefix(model: &str) -> String {
        format!("{}/{}/", model, HISTORY_DIR)
    }

    /// Back up the document stored at `document` (a key inside `model`).
    ///
    /// Returns the new entry name, or `None` when there is no document yet.
    pub async fn on_write(&self, model: &str, document: &str, reason: &str) -> Result<Option<String>> {
        self.on_write_at(model, document, reason, Utc::now()).await
    }

    /// Back up as of `at`.
    pub async fn on_write_at(
        &self,
        model: &str,
        document: &str,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let Some(current) = self.store.get(document).await? else {
            return Ok(None);
        };

        let prefix = Self::prefix(model);
        let stamp = at.format(STAMP_FORMAT).to_string();
        let reason = sanitize_reason(reason);
        let mut ordinal = self.next_ordinal(&prefix, &stamp).await?;

        let name = loop {
            let name = format!("{}.{:06} {}{}", stamp, ordinal, reason, BACKUP_SUFFIX);
            match self.store.create(&format!("{}{}", prefix, name), current.clone()).await? {
                InsertResult::Inserted => break name,
                InsertResult::AlreadyExists => ordinal += 1,
            }
        };
        tracing::debug!(entry = %name, "archived previous document version");

        self.prune(&prefix).await?;
        Ok(Some(name))
    }

    /// Entry names of a model, oldest first.
    pub async fn list(&self, model: &str) -> Result<Vec<String>> {
        let prefix = Self::prefix(model);
        Ok(self
            .store
            .list(&prefix)
            .await?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .filter(|name| name.ends_with(BACKUP_SUFFIX))
            .collect())
    }

    /// Storage key of one entry, if `name` is a well-formed entry name.
    pub fn entry_key(model: &str, name: &str) -> Option<String> {
        let well_formed = name.ends_with(BACKUP_SUFFIX)
            && !name.contains('/')
            && !name.chars().any(char::is_control);
        well_formed.then(|| format!("{}{}", Self::prefix(model), name))
    }

    /// First free ordinal for entries stamped `stamp`.
    async fn next_ordinal(&self, prefix: &str, stamp: &str) -> Result<u32> {
        let lead = format!("{}{}.", prefix, stamp);
        let max = self
            .store
            .list(prefix)
            .await?
            .iter()
            .filter_map(|key| key.strip_prefix(&lead))
            .filter_map(|rest| rest.get(..6)?.parse::<u32>().ok())
            .max();
        Ok(max.map_or(0, |n| n + 1))
    }

    /// Delete the oldest entries until at most `retention` remain.
    async fn prune(&self, prefix: &str) -> Result<usize> {
        let entries = self.store.list(prefix).await?;
        let excess = entries.len().saturating_sub(self.retention);

        for key in entries.iter().take(excess) {
            self.store.delete(key).await?;
        }
        if excess > 0 {
            tracing::debug!(pruned = excess, "pruned history entries");
        }
        Ok(excess)
    }
}

/// Make a change reason safe to embed in an entry name.
///
/// Separators and control characters become `_`; the result is trimmed and
/// capped in bytes at a character boundary. An empty reason becomes `change`.
pub fn sanitize_reason(reason: &str) -> String {
    let mut cleaned = String::new();
    for c in reason.trim().chars() {
        let c = if c == '/' || c == '\\' || c.is_control() { '_' } else { c };
        if cleaned.len() + c.len_utf8() > MAX_REASON_BYTES {
            break;
        }
        cleaned.push(c);
    }
    let cleaned = cleaned.trim_end();
    if cleaned.is_empty() {
        "change".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::TimeZone;
    use threatvault_store::MemoryStore;

    const MODEL: &str = "ns/m1";
    const DOC: &str = "ns/m1/document";

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn archive(retention: usize) -> (Arc<MemoryStore>, HistoryArchive<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Arc::clone(&store), HistoryArchive::new(store, retention))
    }

    #[tokio::test]
    async fn test_nothing_to_back_up() {
        let (_store, history) = archive(50);
        assert_eq!(history.on_write_at(MODEL, DOC, "edit", at(0)).await.unwrap(), None);
        assert!(history.list(MODEL).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backup_copies_raw_bytes() {
        let (store, history) = archive(50);
        store.put(DOC, Bytes::from_static(b"sealed-v1")).await.unwrap();

        let name = history
            .on_write_at(MODEL, DOC, "Model Import", at(0))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(name, "2023-11-14 22:13:20.000000 Model Import.backup");
        let key = HistoryArchive::<MemoryStore>::entry_key(MODEL, &name).unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(Bytes::from_static(b"sealed-v1")));
    }

    #[tokio::test]
    async fn test_same_second_entries_stay_ordered() {
        let (store, history) = archive(50);
        store.put(DOC, Bytes::from_static(b"v")).await.unwrap();

        let mut names = Vec::new();
        for reason in ["b", "a", "c"] {
            names.push(history.on_write_at(MODEL, DOC, reason, at(0)).await.unwrap().unwrap());
        }

        assert_eq!(history.list(MODEL).await.unwrap(), names);
        assert!(names[1].contains(".000001 a"));
    }

    #[tokio::test]
    async fn test_retention_prunes_oldest() {
        let (store, history) = archive(3);
        store.put(DOC, Bytes::from_static(b"v")).await.unwrap();

        for i in 0..5 {
            history
                .on_write_at(MODEL, DOC, &format!("w{}", i), at(i))
                .await
                .unwrap();
        }

        let names = history.list(MODEL).await.unwrap();
        assert_eq!(names.len(), 3);
        assert!(names[0].ends_with(" w2.backup"));
        assert!(names[2].ends_with(" w4.backup"));
    }

    #[test]
    fn test_sanitize_reason() {
        assert_eq!(sanitize_reason("Model Import"), "Model Import");
        assert_eq!(sanitize_reason("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_reason("a\nb"), "a_b");
        assert_eq!(sanitize_reason("   "), "change");
        assert_eq!(sanitize_reason(&"x".repeat(500)).len(), MAX_REASON_BYTES);
    }

    #[test]
    fn test_multibyte_reason_fits_file_name() {
        let reason = sanitize_reason(&"変更".repeat(60));
        assert!(reason.len() <= MAX_REASON_BYTES);
        assert!(reason.chars().all(|c| c == '変' || c == '更'));

        let name = format!("2023-11-14 22:13:20.000000 {}{}", reason, BACKUP_SUFFIX);
        assert!(name.len() <= 255);
    }

    #[test]
    fn test_entry_key_rejects_paths() {
        assert!(HistoryArchive::<MemoryStore>::entry_key(MODEL, "x.backup").is_some());
        assert!(HistoryArchive::<MemoryStore>::entry_key(MODEL, "../document").is_none());
        assert!(HistoryArchive::<MemoryStore>::entry_key(MODEL, "a/b.backup").is_none());
    }
}
