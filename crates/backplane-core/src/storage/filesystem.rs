//! Filesystem storage: one JSON file per record at `<base_dir>/<table>/<key>.json`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::traits::StorageEngine;
use super::types::{merge_into, record_from_value, with_id, Record};
use crate::error::{BackplaneError, Result};
use crate::fs::write_atomic;

const RECORD_EXTENSION: &str = "json";

/// Reject table names and keys that would escape their directory.
pub(crate) fn check_segment(kind: &str, value: &str) -> Result<()> {
    let bad = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);
    if bad {
        return Err(BackplaneError::InvalidInput(format!(
            "Invalid {} name: {:?}",
            kind, value
        )));
    }
    Ok(())
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_record(path: &Path, bytes: &[u8]) -> Result<Record> {
    let value = serde_json::from_slice(bytes)?;
    record_from_value(value).map_err(|_| {
        BackplaneError::Storage(format!("{} does not hold a JSON object", path.display()))
    })
}

#[derive(Debug, Clone)]
pub struct FilesystemStorage {
    base_dir: PathBuf,
}

impl FilesystemStorage {
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        tracing::info!(base_dir = %base_dir.display(), "filesystem storage opened");
        Ok(FilesystemStorage { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn table_dir(&self, table: &str) -> Result<PathBuf> {
        check_segment("table", table)?;
        Ok(self.base_dir.join(table))
    }

    fn record_path(&self, table: &str, key: &str) -> Result<PathBuf> {
        check_segment("key", key)?;
        Ok(self
            .table_dir(table)?
            .join(format!("{}.{}", key, RECORD_EXTENSION)))
    }

    fn write_record(&self, table: &str, key: &str, record: &Record) -> Result<()> {
        fs::create_dir_all(self.table_dir(table)?)?;
        let path = self.record_path(table, key)?;
        write_atomic(&path, &serde_json::to_vec(record)?)?;
        Ok(())
    }
}

impl StorageEngine for FilesystemStorage {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn insert_item(&self, table: &str, key: &str, record: Record) -> Result<Record> {
        let record = with_id(record, key);
        self.write_record(table, key, &record)?;
        tracing::debug!(table, key, "record written");
        Ok(record)
    }

    fn get_item(&self, table: &str, key: &str) -> Result<Option<Record>> {
        let path = self.record_path(table, key)?;
        match read_optional(&path)? {
            Some(bytes) => Ok(Some(parse_record(&path, &bytes)?)),
            None => {
                tracing::debug!(table, key, "record not found");
                Ok(None)
            }
        }
    }

    /// Raw bytes of `<key>.json`, or of a non-JSON payload stored under the exact `<key>`.
    fn get_binary_item(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        if let Some(bytes) = read_optional(&self.record_path(table, key)?)? {
            return Ok(Some(bytes));
        }
        read_optional(&self.table_dir(table)?.join(key))
    }

    fn get_all_items(&self, table: &str) -> Result<Vec<Record>> {
        let dir = self.table_dir(table)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_record = path.extension().is_some_and(|ext| ext == RECORD_EXTENSION);
            let is_hidden = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with('.'));
            if !is_record || is_hidden || !path.is_file() {
                continue;
            }
            records.push(parse_record(&path, &fs::read(&path)?)?);
        }
        tracing::debug!(table, count = records.len(), "table scanned");
        Ok(records)
    }

    fn update_item(&self, table: &str, key: &str, partial: Record) -> Result<Option<Record>> {
        let Some(mut record) = self.get_item(table, key)? else {
            tracing::warn!(table, key, "update skipped, record not found");
            return Ok(None);
        };
        merge_into(&mut record, &partial);
        self.write_record(table, key, &record)?;
        Ok(Some(record))
    }

    fn delete_item(&self, table: &str, key: &str) -> Result<()> {
        match fs::remove_file(self.record_path(table, key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
