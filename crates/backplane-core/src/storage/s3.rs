//! S3 object storage: one object per record at `<table>/<key>`.
//!
//! Uses virtual-hosted addressing against AWS, or path-style addressing
//! when `endpoint_url` points at an S3-compatible server.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Response;
use reqwest::{Method, StatusCode};
use urlencoding::encode;

use super::traits::StorageEngine;
use super::types::{merge_into, record_from_value, with_id, Record};
use crate::aws::{AwsClient, AwsConfig};
use crate::error::{BackplaneError, Result};
use crate::xml;

const SERVICE: &str = "S3";

static KEY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<Key>([^<]*)</Key>").expect("valid regex"));
static TRUNCATED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<IsTruncated>\s*true\s*</IsTruncated>").expect("valid regex"));
static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<NextContinuationToken>([^<]*)</NextContinuationToken>").expect("valid regex")
});

/// One page of a ListObjectsV2 response.
#[derive(Debug, Default, PartialEq)]
struct ListPage {
    keys: Vec<String>,
    next_token: Option<String>,
}

fn parse_list_page(body: &str) -> ListPage {
    let keys = KEY_RE
        .captures_iter(body)
        .map(|c| xml::unescape(&c[1]))
        .collect();
    let next_token = if TRUNCATED_RE.is_match(body) {
        TOKEN_RE.captures(body).map(|c| xml::unescape(&c[1]))
    } else {
        None
    };
    ListPage { keys, next_token }
}

fn service_error(status: StatusCode, body: &str) -> BackplaneError {
    let code = xml::element_text(body, "Code").unwrap_or_else(|| status.as_u16().to_string());
    let message = xml::element_text(body, "Message").unwrap_or_else(|| status.to_string());
    BackplaneError::service(SERVICE, code, message)
}

fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(service_error(status, &body))
}

#[derive(Debug, Clone)]
pub struct S3Storage {
    client: AwsClient,
    bucket: String,
}

impl S3Storage {
    pub fn new(bucket: impl Into<String>, aws: AwsConfig) -> Result<Self> {
        let bucket = bucket.into();
        if bucket.is_empty() {
            return Err(BackplaneError::Config(
                "S3 storage requires a bucket_name".to_string(),
            ));
        }
        let client = AwsClient::new(aws, "s3", SERVICE)?;
        tracing::info!(bucket = %bucket, "S3 storage initialised");
        Ok(S3Storage { client, bucket })
    }

    /// Bucket root URL, without trailing slash.
    fn bucket_url(&self) -> String {
        match self.client.endpoint_url() {
            Some(endpoint) => format!("{}/{}", endpoint, encode(&self.bucket)),
            None => format!(
                "https://{}.s3.{}.amazonaws.com",
                self.bucket,
                self.client.region()
            ),
        }
    }

    fn object_url(&self, object_key: &str) -> String {
        let path = object_key
            .split('/')
            .map(|segment| encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.bucket_url(), path)
    }

    fn object_key(table: &str, key: &str) -> String {
        format!("{}/{}", table, key)
    }

    fn get_object(&self, object_key: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .send(Method::GET, &self.object_url(object_key), &[], Vec::new())?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(object_key, "object not found");
            return Ok(None);
        }
        Ok(Some(check(response)?.bytes()?.to_vec()))
    }

    fn put_object(&self, object_key: &str, record: &Record) -> Result<()> {
        let body = serde_json::to_vec(record)?;
        let response = self.client.send(
            Method::PUT,
            &self.object_url(object_key),
            &[("content-type", "application/json")],
            body,
        )?;
        check(response)?;
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let mut url = format!(
                "{}/?list-type=2&prefix={}",
                self.bucket_url(),
                encode(prefix)
            );
            if let Some(token) = &token {
                url.push_str("&continuation-token=");
                url.push_str(&encode(token));
            }
            let response = self.client.send(Method::GET, &url, &[], Vec::new())?;
            let page = parse_list_page(&check(response)?.text()?);
            keys.extend(page.keys);
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(keys)
    }
}

impl StorageEngine for S3Storage {
    fn name(&self) -> &'static str {
        "s3"
    }

    fn insert_item(&self, table: &str, key: &str, record: Record) -> Result<Record> {
        let record = with_id(record, key);
        self.put_object(&Self::object_key(table, key), &record)?;
        tracing::debug!(table, key, "object written");
        Ok(record)
    }

    fn get_item(&self, table: &str, key: &str) -> Result<Option<Record>> {
        match self.get_object(&Self::object_key(table, key))? {
            Some(bytes) => Ok(Some(record_from_value(serde_json::from_slice(&bytes)?)?)),
            None => Ok(None),
        }
    }

    fn get_binary_item(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        self.get_object(&Self::object_key(table, key))
    }

    /// Lists `<table>/` and fetches each object. Objects that are not JSON
    /// records (binary uploads sharing the prefix) are skipped.
    fn get_all_items(&self, table: &str) -> Result<Vec<Record>> {
        let mut records = Vec::new();
        for object_key in self.list_keys(&format!("{}/", table))? {
            let Some(bytes) = self.get_object(&object_key)? else {
                continue;
            };
            match serde_json::from_slice(&bytes).map(record_from_value) {
                Ok(Ok(record)) => records.push(record),
                _ => tracing::debug!(object_key, "skipping non-record object"),
            }
        }
        tracing::debug!(table, count = records.len(), "table listed");
        Ok(records)
    }

    fn update_item(&self, table: &str, key: &str, partial: Record) -> Result<Option<Record>> {
        let Some(mut record) = self.get_item(table, key)? else {
            tracing::warn!(table, key, "update skipped, object not found");
            return Ok(None);
        };
        merge_into(&mut record, &partial);
        self.put_object(&Self::object_key(table, key), &record)?;
        Ok(Some(record))
    }

    fn delete_item(&self, table: &str, key: &str) -> Result<()> {
        let response = self.client.send(
            Method::DELETE,
            &self.object_url(&Self::object_key(table, key)),
            &[],
            Vec::new(),
        )?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        check(response)?;
        Ok(())
    }
}
