//! DynamoDB key-value storage.
//!
//! Each logical table maps to the DynamoDB table `<table_prefix><table>`
//! with a string partition key `id`. Tables are created on first insert
//! with on-demand billing.

use std::thread;
use std::time::Duration;

use serde_json::{json, Map, Value};

use super::attribute::{decode_binary, from_item, to_attribute, to_item};
use super::traits::StorageEngine;
use super::types::{with_id, Record, ID_FIELD};
use crate::aws::{AwsClient, AwsConfig};
use crate::error::{BackplaneError, Result};

const SERVICE: &str = "DynamoDB";
const CONTENT_TYPE: &str = "application/x-amz-json-1.0";
const TABLE_NOT_FOUND: &str = "ResourceNotFoundException";
const TABLE_IN_USE: &str = "ResourceInUseException";
const CONDITION_FAILED: &str = "ConditionalCheckFailedException";
const ACTIVE_POLL_ATTEMPTS: u32 = 60;

/// Attribute holding raw bytes for `get_binary_item`.
pub const BINARY_FIELD: &str = "data";

fn is_missing_table(err: &BackplaneError) -> bool {
    err.service_code() == Some(TABLE_NOT_FOUND)
}

fn key_of(key: &str) -> Value {
    json!({ ID_FIELD: { "S": key } })
}

#[derive(Debug, Clone)]
pub struct DynamoDbStorage {
    client: AwsClient,
    table_prefix: String,
    poll_interval: Duration,
}

impl DynamoDbStorage {
    pub fn new(table_prefix: impl Into<String>, aws: AwsConfig) -> Result<Self> {
        let client = AwsClient::new(aws, "dynamodb", SERVICE)?;
        let table_prefix = table_prefix.into();
        tracing::info!(region = client.region(), table_prefix = %table_prefix, "DynamoDB storage initialised");
        Ok(DynamoDbStorage {
            client,
            table_prefix,
            poll_interval: Duration::from_secs(1),
        })
    }

    /// Interval between `DescribeTable` polls while a new table becomes active.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn table_name(&self, table: &str) -> String {
        format!("{}{}", self.table_prefix, table)
    }

    fn call(&self, operation: &str, payload: Value) -> Result<Value> {
        let url = match self.client.endpoint_url() {
            Some(endpoint) => format!("{}/", endpoint),
            None => format!("https://dynamodb.{}.amazonaws.com/", self.client.region()),
        };
        let target = format!("DynamoDB_20120810.{}", operation);
        self.client.json_call(&url, CONTENT_TYPE, &target, &payload)
    }

    fn create_table(&self, name: &str) -> Result<()> {
        tracing::info!(table = name, "creating DynamoDB table");
        let created = self.call(
            "CreateTable",
            json!({
                "TableName": name,
                "AttributeDefinitions": [{"AttributeName": ID_FIELD, "AttributeType": "S"}],
                "KeySchema": [{"AttributeName": ID_FIELD, "KeyType": "HASH"}],
                "BillingMode": "PAY_PER_REQUEST",
            }),
        );
        match created {
            Ok(_) => {}
            Err(err) if err.service_code() == Some(TABLE_IN_USE) => {}
            Err(err) => return Err(err),
        }

        for _ in 0..ACTIVE_POLL_ATTEMPTS {
            let described = self.call("DescribeTable", json!({ "TableName": name }))?;
            let status = described
                .pointer("/Table/TableStatus")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if status == "ACTIVE" {
                return Ok(());
            }
            thread::sleep(self.poll_interval);
        }
        Err(BackplaneError::Storage(format!(
            "Table {} did not become active",
            name
        )))
    }

    fn put(&self, name: &str, record: &Record) -> Result<()> {
        self.call(
            "PutItem",
            json!({ "TableName": name, "Item": to_item(record) }),
        )?;
        Ok(())
    }

    fn get_raw(&self, table: &str, key: &str) -> Result<Option<Map<String, Value>>> {
        let response = self.call(
            "GetItem",
            json!({
                "TableName": self.table_name(table),
                "Key": key_of(key),
                "ConsistentRead": true,
            }),
        );
        match response {
            Ok(mut body) => match body.get_mut("Item").map(Value::take) {
                Some(Value::Object(item)) => Ok(Some(item)),
                _ => Ok(None),
            },
            Err(err) if is_missing_table(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

impl StorageEngine for DynamoDbStorage {
    fn name(&self) -> &'static str {
        "dynamodb"
    }

    fn insert_item(&self, table: &str, key: &str, record: Record) -> Result<Record> {
        let record = with_id(record, key);
        let name = self.table_name(table);
        match self.put(&name, &record) {
            Ok(()) => {}
            Err(err) if is_missing_table(&err) => {
                self.create_table(&name)?;
                self.put(&name, &record)?;
            }
            Err(err) => return Err(err),
        }
        tracing::debug!(table = %name, key, "item put");
        Ok(record)
    }

    fn get_item(&self, table: &str, key: &str) -> Result<Option<Record>> {
        match self.get_raw(table, key)? {
            Some(item) => Ok(Some(from_item(&item)?)),
            None => Ok(None),
        }
    }

    /// Decoded bytes of the binary `data` attribute, or the record as JSON.
    fn get_binary_item(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let Some(item) = self.get_raw(table, key)? else {
            return Ok(None);
        };
        if let Some(encoded) = item
            .get(BINARY_FIELD)
            .and_then(|attribute| attribute.get("B"))
            .and_then(Value::as_str)
        {
            return decode_binary(encoded).map(Some);
        }
        Ok(Some(serde_json::to_vec(&from_item(&item)?)?))
    }

    fn get_all_items(&self, table: &str) -> Result<Vec<Record>> {
        let name = self.table_name(table);
        let mut records = Vec::new();
        let mut start_key: Option<Value> = None;
        loop {
            let mut request = json!({ "TableName": name });
            if let Some(start) = start_key.take() {
                request["ExclusiveStartKey"] = start;
            }
            let page = match self.call("Scan", request) {
                Ok(page) => page,
                Err(err) if is_missing_table(&err) => return Ok(Vec::new()),
                Err(err) => return Err(err),
            };
            if let Some(items) = page.get("Items").and_then(Value::as_array) {
                for item in items.iter().filter_map(Value::as_object) {
                    records.push(from_item(item)?);
                }
            }
            match page.get("LastEvaluatedKey") {
                Some(next) if next.is_object() => start_key = Some(next.clone()),
                _ => break,
            }
        }
        Ok(records)
    }

    fn update_item(&self, table: &str, key: &str, partial: Record) -> Result<Option<Record>> {
        let fields: Vec<(&String, &Value)> =
            partial.iter().filter(|(field, _)| *field != ID_FIELD).collect();
        if fields.is_empty() {
            return self.get_item(table, key);
        }

        let mut names = Map::new();
        let mut values = Map::new();
        let mut assignments = Vec::with_capacity(fields.len());
        for (i, (field, value)) in fields.into_iter().enumerate() {
            names.insert(format!("#k{}", i), Value::String(field.clone()));
            values.insert(format!(":v{}", i), to_attribute(value));
            assignments.push(format!("#k{} = :v{}", i, i));
        }
        names.insert("#id".to_string(), Value::String(ID_FIELD.to_string()));

        let response = self.call(
            "UpdateItem",
            json!({
                "TableName": self.table_name(table),
                "Key": key_of(key),
                "UpdateExpression": format!("SET {}", assignments.join(", ")),
                "ConditionExpression": "attribute_exists(#id)",
                "ExpressionAttributeNames": names,
                "ExpressionAttributeValues": values,
                "ReturnValues": "ALL_NEW",
            }),
        );
        match response {
            Ok(body) => match body.get("Attributes").and_then(Value::as_object) {
                Some(attributes) => Ok(Some(from_item(attributes)?)),
                None => Ok(None),
            },
            Err(err) if err.service_code() == Some(CONDITION_FAILED) || is_missing_table(&err) => {
                tracing::warn!(table, key, "update skipped, item not found");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn delete_item(&self, table: &str, key: &str) -> Result<()> {
        let response = self.call(
            "DeleteItem",
            json!({ "TableName": self.table_name(table), "Key": key_of(key) }),
        );
        match response {
            Ok(_) => Ok(()),
            Err(err) if is_missing_table(&err) => Ok(()),
            Err(err) => Err(err),
        }
    }
}
