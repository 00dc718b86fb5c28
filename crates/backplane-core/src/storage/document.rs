//! Embedded document store: one JSON file per table.
//!
//! File layout is `<base_dir>/<table>.json` holding
//! `{"<table>": {"<id>": {record}}}`, the TinyDB file format. Ids are opaque
//! strings and are used directly as document handles.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use serde_json::{Map, Value};

use super::filesystem::check_segment;
use super::traits::StorageEngine;
use super::types::{merge_into, with_id, Record};
use crate::error::{BackplaneError, Result};
use crate::fs::write_atomic;

type Documents = Map<String, Value>;

/// One write lock per canonical store directory, shared by every handle in
/// the process.
static WRITE_LOCKS: Lazy<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = Lazy::new(Default::default);

fn shared_write_lock(base_dir: &Path) -> Result<Arc<Mutex<()>>> {
    let mut locks = WRITE_LOCKS
        .lock()
        .map_err(|_| BackplaneError::Storage("Document lock table poisoned".to_string()))?;
    Ok(Arc::clone(locks.entry(base_dir.to_path_buf()).or_default()))
}

/// Document store backed by per-table JSON files.
///
/// Every operation re-reads the table file, so several handles over the same
/// directory observe each other's writes. Writes to one directory are
/// serialised across all handles in the process and land through an atomic
/// rename.
#[derive(Debug)]
pub struct DocumentStorage {
    base_dir: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl DocumentStorage {
    /// Open (and create if needed) a document store rooted at `base_dir`.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        let base_dir = fs::canonicalize(&base_dir)?;
        tracing::info!(base_dir = %base_dir.display(), "document storage opened");
        Ok(DocumentStorage {
            write_lock: shared_write_lock(&base_dir)?,
            base_dir,
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn table_path(&self, table: &str) -> Result<PathBuf> {
        check_segment("table", table)?;
        Ok(self.base_dir.join(format!("{}.json", table)))
    }

    fn load(&self, table: &str) -> Result<Documents> {
        let path = self.table_path(table)?;
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Documents::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Documents::new());
        }

        let mut file: Map<String, Value> = serde_json::from_slice(&raw)?;
        match file.remove(table) {
            None => Ok(Documents::new()),
            Some(Value::Object(documents)) => Ok(documents),
            Some(_) => Err(BackplaneError::Storage(format!(
                "Table file {} is malformed",
                path.display()
            ))),
        }
    }

    fn save(&self, table: &str, documents: Documents) -> Result<()> {
        let path = self.table_path(table)?;
        let mut file = Map::new();
        file.insert(table.to_string(), Value::Object(documents));
        write_atomic(&path, &serde_json::to_vec(&file)?)?;
        Ok(())
    }

    /// Load, mutate and (if `f` reports a change) save a table under the lock.
    fn modify<T>(&self, table: &str, f: impl FnOnce(&mut Documents) -> (T, bool)) -> Result<T> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| BackplaneError::Storage("Document store lock poisoned".to_string()))?;
        let mut documents = self.load(table)?;
        let (result, changed) = f(&mut documents);
        if changed {
            self.save(table, documents)?;
        }
        Ok(result)
    }
}

fn as_record(value: &Value) -> Option<Record> {
    value.as_object().cloned()
}

impl StorageEngine for DocumentStorage {
    fn name(&self) -> &'static str {
        "tinydb"
    }

    fn insert_item(&self, table: &str, key: &str, record: Record) -> Result<Record> {
        let record = with_id(record, key);
        let stored = record.clone();
        self.modify(table, |documents| {
            documents.insert(key.to_string(), Value::Object(stored));
            ((), true)
        })?;
        tracing::debug!(table, key, "document inserted");
        Ok(record)
    }

    fn get_item(&self, table: &str, key: &str) -> Result<Option<Record>> {
        Ok(self.load(table)?.get(key).and_then(as_record))
    }

    fn get_binary_item(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        match self.get_item(table, key)? {
            Some(record) => Ok(Some(serde_json::to_vec(&record)?)),
            None => Ok(None),
        }
    }

    fn get_all_items(&self, table: &str) -> Result<Vec<Record>> {
        Ok(self.load(table)?.values().filter_map(as_record).collect())
    }

    fn update_item(&self, table: &str, key: &str, partial: Record) -> Result<Option<Record>> {
        self.modify(table, |documents| match documents.get_mut(key) {
            Some(Value::Object(existing)) => {
                merge_into(existing, &partial);
                (Some(existing.clone()), true)
            }
            _ => (None, false),
        })
    }

    fn delete_item(&self, table: &str, key: &str) -> Result<()> {
        self.modify(table, |documents| {
            let removed = documents.remove(key).is_some();
            ((), removed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_separate_handles_do_not_lose_writes() {
        let dir = tempdir().unwrap();
        let handles: Vec<_> = (0..2)
            .map(|_| Arc::new(DocumentStorage::open(dir.path()).unwrap()))
            .collect();
        assert!(Arc::ptr_eq(&handles[0].write_lock, &handles[1].write_lock));

        let workers: Vec<_> = (0..8)
            .map(|n| {
                let store = Arc::clone(&handles[n % 2]);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        store
                            .insert_item("jobs", &format!("{}-{}", n, i), Record::new())
                            .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(handles[0].get_all_items("jobs").unwrap().len(), 80);
    }

    #[test]
    fn test_file_layout_is_keyed_by_table_name() {
        let dir = tempdir().unwrap();
        let store = DocumentStorage::open(dir.path()).unwrap();
        store
            .insert_item("config", "c1", record(json!({"name": "x"})))
            .unwrap();

        let raw: Value =
            serde_json::from_slice(&fs::read(dir.path().join("config.json")).unwrap()).unwrap();
        assert_eq!(raw, json!({"config": {"c1": {"id": "c1", "name": "x"}}}));
    }

    #[test]
    fn test_non_uuid_ids_are_accepted() {
        let dir = tempdir().unwrap();
        let store = DocumentStorage::open(dir.path()).unwrap();
        store
            .insert_item("user", "alice@example.com", record(json!({})))
            .unwrap();
        assert!(store.get_item("user", "alice@example.com").unwrap().is_some());
    }

    #[test]
    fn test_two_handles_share_state() {
        let dir = tempdir().unwrap();
        let a = DocumentStorage::open(dir.path()).unwrap();
        let b = DocumentStorage::open(dir.path()).unwrap();
        a.insert_item("t", "k", record(json!({"v": 1}))).unwrap();
        assert_eq!(b.get_item("t", "k").unwrap().unwrap()["v"], json!(1));
    }

    #[test]
    fn test_table_name_with_separator_is_rejected() {
        let dir = tempdir().unwrap();
        let store = DocumentStorage::open(dir.path()).unwrap();
        let err = store.get_all_items("../escape").unwrap_err();
        assert!(matches!(err, BackplaneError::InvalidInput(_)));
    }
}
