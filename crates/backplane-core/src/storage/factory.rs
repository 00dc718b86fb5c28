//! Storage backend selection.

use std::sync::Arc;

use super::document::DocumentStorage;
use super::dynamodb::DynamoDbStorage;
use super::filesystem::FilesystemStorage;
use super::s3::S3Storage;
use super::traits::StorageEngine;
use crate::config::Settings;
use crate::error::{BackplaneError, Result};

/// Build the storage backend named by `settings.database_type`.
///
/// Returns `Ok(None)` for `none`: callers treat that as "storage unavailable"
/// and skip persistence. A fresh handle is constructed on every call.
///
/// # Errors
///
/// Returns `BackplaneError::Config` for an unknown `database_type` or a
/// missing backend parameter.
pub fn get_database(settings: &Settings) -> Result<Option<Arc<dyn StorageEngine>>> {
    let database_type = settings.database_type.trim().to_ascii_lowercase();
    tracing::debug!(database_type = %database_type, "building storage backend");

    let engine: Arc<dyn StorageEngine> = match database_type.as_str() {
        "tinydb" => Arc::new(DocumentStorage::open(&settings.base_dir)?),
        "filesystem" => Arc::new(FilesystemStorage::open(&settings.base_dir)?),
        "s3" => {
            let bucket = settings.bucket_name.clone().ok_or_else(|| {
                BackplaneError::Config("database_type 's3' requires bucket_name".to_string())
            })?;
            Arc::new(S3Storage::new(bucket, settings.aws_config())?)
        }
        "dynamodb" => Arc::new(DynamoDbStorage::new(
            settings.table_prefix.clone(),
            settings.aws_config(),
        )?),
        "none" => return Ok(None),
        other => {
            return Err(BackplaneError::Config(format!(
                "Unsupported database type: {}",
                other
            )))
        }
    };
    Ok(Some(engine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn settings(database_type: &str, base_dir: &std::path::Path) -> Settings {
        Settings {
            database_type: database_type.to_string(),
            base_dir: base_dir.to_path_buf(),
            ..Settings::default()
        }
    }

    #[test]
    fn test_none_yields_no_handle() {
        let dir = tempdir().unwrap();
        assert!(get_database(&settings("none", dir.path())).unwrap().is_none());
    }

    #[test]
    fn test_local_backends() {
        let dir = tempdir().unwrap();
        let tinydb = get_database(&settings("tinydb", dir.path())).unwrap().unwrap();
        assert_eq!(tinydb.name(), "tinydb");
        let fs = get_database(&settings("FileSystem", dir.path())).unwrap().unwrap();
        assert_eq!(fs.name(), "filesystem");
    }

    #[test]
    fn test_unknown_type_is_config_error() {
        let dir = tempdir().unwrap();
        let err = get_database(&settings("mongo", dir.path())).err().unwrap();
        assert!(matches!(err, BackplaneError::Config(_)));
    }

    #[test]
    fn test_s3_requires_bucket() {
        let dir = tempdir().unwrap();
        let err = get_database(&settings("s3", dir.path())).err().unwrap();
        assert!(matches!(err, BackplaneError::Config(_)));
    }
}
