//! Cloud backends against a local mock HTTP server.

use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use backplane_core::auth::{AuthProvider, CognitoAuthProvider};
use backplane_core::aws::{AwsConfig, AwsCredentials};
use backplane_core::queue::{AzureQueue, QueueClient, SqsQueue};
use backplane_core::storage::{record_from_value, DynamoDbStorage, S3Storage, StorageEngine};

const AMZ_JSON: &str = "application/x-amz-json-1.0";

fn aws_config(server: &MockServer) -> AwsConfig {
    AwsConfig {
        region: "us-east-1".to_string(),
        credentials: Some(AwsCredentials {
            access_key_id: "AKIDEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: None,
        }),
        endpoint_url: Some(server.base_url()),
    }
}

fn dynamodb(server: &MockServer) -> DynamoDbStorage {
    DynamoDbStorage::new("app_", aws_config(server))
        .expect("client should build")
        .with_poll_interval(Duration::ZERO)
}

#[test]
fn test_s3_put_get_and_missing() {
    let server = MockServer::start();
    let put = server.mock(|when, then| {
        when.method(PUT)
            .path("/bucket/config/k1")
            .header_exists("authorization")
            .body_contains("\"name\":\"alpha\"");
        then.status(200);
    });
    server.mock(|when, then| {
        when.method(GET).path("/bucket/config/k1");
        then.status(200).body(r#"{"id":"k1","name":"alpha"}"#);
    });
    server.mock(|when, then| {
        when.method(GET).path("/bucket/config/missing");
        then.status(404)
            .body("<Error><Code>NoSuchKey</Code><Message>gone</Message></Error>");
    });

    let storage = S3Storage::new("bucket", aws_config(&server)).expect("client should build");
    let stored = storage
        .insert_item("config", "k1", record_from_value(json!({"name": "alpha"})).unwrap())
        .expect("put should succeed");
    put.assert();
    assert_eq!(stored["id"], json!("k1"));

    let fetched = storage.get_item("config", "k1").unwrap().expect("object should exist");
    assert_eq!(fetched, stored);
    assert!(storage.get_item("config", "missing").unwrap().is_none());
}

#[test]
fn test_s3_listing_skips_non_records() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/bucket/").query_param("list-type", "2");
        then.status(200).body(
            "<ListBucketResult><IsTruncated>false</IsTruncated>\
             <Contents><Key>audio/a</Key></Contents>\
             <Contents><Key>audio/clip.wav</Key></Contents></ListBucketResult>",
        );
    });
    server.mock(|when, then| {
        when.method(GET).path("/bucket/audio/a");
        then.status(200).body(r#"{"id":"a"}"#);
    });
    server.mock(|when, then| {
        when.method(GET).path("/bucket/audio/clip.wav");
        then.status(200).body([0u8, 159, 146, 150]);
    });

    let storage = S3Storage::new("bucket", aws_config(&server)).unwrap();
    let records = storage.get_all_items("audio").expect("listing should succeed");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], json!("a"));

    let raw = storage.get_binary_item("audio", "clip.wav").unwrap().unwrap();
    assert_eq!(raw, vec![0u8, 159, 146, 150]);
}

#[test]
fn test_s3_access_denied_is_service_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/bucket/config/k1");
        then.status(403)
            .body("<Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>");
    });

    let storage = S3Storage::new("bucket", aws_config(&server)).unwrap();
    let err = storage.get_item("config", "k1").unwrap_err();
    assert_eq!(err.service_code(), Some("AccessDenied"));
}

#[test]
fn test_s3_update_merges_and_keeps_id() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/bucket/config/k1");
        then.status(200).body(r#"{"id":"k1","name":"alpha","level":1}"#);
    });
    let put = server.mock(|when, then| {
        when.method(PUT)
            .path("/bucket/config/k1")
            .body_contains(r#""id":"k1""#)
            .body_contains(r#""level":2"#)
            .body_contains(r#""name":"alpha""#);
        then.status(200);
    });
    server.mock(|when, then| {
        when.method(GET).path("/bucket/config/missing");
        then.status(404)
            .body("<Error><Code>NoSuchKey</Code><Message>gone</Message></Error>");
    });
    let put_missing = server.mock(|when, then| {
        when.method(PUT).path("/bucket/config/missing");
        then.status(200);
    });

    let storage = S3Storage::new("bucket", aws_config(&server)).unwrap();
    let partial = record_from_value(json!({"level": 2, "id": "other"})).unwrap();
    let updated = storage
        .update_item("config", "k1", partial.clone())
        .unwrap()
        .expect("object should exist");
    put.assert();
    assert_eq!(updated, record_from_value(json!({"id": "k1", "name": "alpha", "level": 2})).unwrap());

    assert!(storage.update_item("config", "missing", partial).unwrap().is_none());
    put_missing.assert_hits(0);
}

#[test]
fn test_s3_delete_is_idempotent() {
    let server = MockServer::start();
    let delete = server.mock(|when, then| {
        when.method(DELETE).path("/bucket/config/k1").header_exists("authorization");
        then.status(204);
    });
    server.mock(|when, then| {
        when.method(DELETE).path("/bucket/config/gone");
        then.status(404)
            .body("<Error><Code>NoSuchKey</Code><Message>gone</Message></Error>");
    });

    let storage = S3Storage::new("bucket", aws_config(&server)).unwrap();
    storage.delete_item("config", "k1").expect("delete should succeed");
    delete.assert();
    storage.delete_item("config", "gone").expect("missing object is fine");
}

#[test]
fn test_dynamodb_update_sets_fields_except_id() {
    let server = MockServer::start();
    let update = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "DynamoDB_20120810.UpdateItem")
            .body_contains(r#""TableName":"app_config""#)
            .body_contains(r#""Key":{"id":{"S":"k1"}}"#)
            .body_contains(r#""UpdateExpression":"SET #k0 = :v0""#)
            .body_contains(r##""#k0":"level""##)
            .body_contains(r#"":v0":{"N":"2"}"#)
            .body_contains("attribute_exists(#id)")
            .body_contains(r#""ReturnValues":"ALL_NEW""#);
        then.status(200).header("content-type", AMZ_JSON).json_body(json!({
            "Attributes": {"id": {"S": "k1"}, "name": {"S": "alpha"}, "level": {"N": "2"}}
        }));
    });

    let partial = record_from_value(json!({"level": 2, "id": "other"})).unwrap();
    let updated = dynamodb(&server)
        .update_item("config", "k1", partial)
        .expect("update should succeed")
        .expect("item should exist");
    update.assert();
    assert_eq!(updated, record_from_value(json!({"id": "k1", "name": "alpha", "level": 2})).unwrap());
}

#[test]
fn test_dynamodb_delete_item() {
    let server = MockServer::start();
    let delete = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "DynamoDB_20120810.DeleteItem")
            .body_contains(r#""Key":{"id":{"S":"k1"}}"#);
        then.status(200).header("content-type", AMZ_JSON).body("{}");
    });

    dynamodb(&server).delete_item("config", "k1").expect("delete should succeed");
    delete.assert();
}

#[test]
fn test_dynamodb_get_item() {
    let server = MockServer::start();
    let get = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "DynamoDB_20120810.GetItem")
            .body_contains("\"TableName\":\"app_config\"");
        then.status(200).header("content-type", AMZ_JSON).json_body(json!({
            "Item": {"id": {"S": "k1"}, "n": {"N": "3"}, "tags": {"L": [{"S": "x"}]}}
        }));
    });

    let record = dynamodb(&server)
        .get_item("config", "k1")
        .expect("get should succeed")
        .expect("item should exist");
    get.assert();
    assert_eq!(record["n"], json!(3));
    assert_eq!(record["tags"], json!(["x"]));
}

#[test]
fn test_dynamodb_missing_table_reads_as_empty() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/");
        then.status(400).header("content-type", AMZ_JSON).json_body(json!({
            "__type": "com.amazonaws.dynamodb.v20120810#ResourceNotFoundException",
            "message": "Requested resource not found"
        }));
    });

    let storage = dynamodb(&server);
    assert!(storage.get_item("config", "k1").unwrap().is_none());
    assert!(storage.get_all_items("config").unwrap().is_empty());
    storage.delete_item("config", "k1").expect("delete should be idempotent");
}

#[test]
fn test_dynamodb_scan_follows_pagination() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "DynamoDB_20120810.Scan")
            .json_body(json!({"TableName": "app_config"}));
        then.status(200).header("content-type", AMZ_JSON).json_body(json!({
            "Items": [{"id": {"S": "a"}}],
            "LastEvaluatedKey": {"id": {"S": "a"}}
        }));
    });
    let second = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "DynamoDB_20120810.Scan")
            .body_contains("ExclusiveStartKey");
        then.status(200).header("content-type", AMZ_JSON).json_body(json!({
            "Items": [{"id": {"S": "b"}}]
        }));
    });

    let records = dynamodb(&server).get_all_items("config").expect("scan should succeed");
    first.assert();
    second.assert();
    let ids: Vec<_> = records.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!("a"), json!("b")]);
}

#[test]
fn test_dynamodb_update_missing_item_is_none() {
    let server = MockServer::start();
    let update = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "DynamoDB_20120810.UpdateItem")
            .body_contains("attribute_exists(#id)");
        then.status(400).header("content-type", AMZ_JSON).json_body(json!({
            "__type": "com.amazonaws.dynamodb.v20120810#ConditionalCheckFailedException",
            "message": "The conditional request failed"
        }));
    });

    let result = dynamodb(&server)
        .update_item("config", "ghost", record_from_value(json!({"a": 1})).unwrap())
        .expect("update should not fail");
    update.assert();
    assert!(result.is_none());
}

#[test]
fn test_dynamodb_insert_creates_missing_table() {
    let server = MockServer::start();
    let put = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "DynamoDB_20120810.PutItem");
        then.status(400).header("content-type", AMZ_JSON).json_body(json!({
            "__type": "com.amazonaws.dynamodb.v20120810#ResourceNotFoundException",
            "message": "Requested resource not found"
        }));
    });
    let create = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "DynamoDB_20120810.CreateTable")
            .body_contains("PAY_PER_REQUEST");
        then.status(200).header("content-type", AMZ_JSON).json_body(json!({}));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "DynamoDB_20120810.DescribeTable");
        then.status(200)
            .header("content-type", AMZ_JSON)
            .json_body(json!({"Table": {"TableStatus": "ACTIVE"}}));
    });

    // The mock keeps answering "not found", so the retried put fails too.
    let err = dynamodb(&server)
        .insert_item("config", "k1", record_from_value(json!({})).unwrap())
        .unwrap_err();
    create.assert_hits(1);
    put.assert_hits(2);
    assert_eq!(err.service_code(), Some("ResourceNotFoundException"));
}

#[test]
fn test_sqs_send_receive_count() {
    let server = MockServer::start();
    let queue_url = server.url("/000000000000/jobs");
    let send = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "AmazonSQS.SendMessage")
            .body_contains("/000000000000/jobs")
            .body_contains(r#""MessageBody":"{\"a\":1}""#);
        then.status(200)
            .header("content-type", AMZ_JSON)
            .json_body(json!({"MessageId": "m-1"}));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "AmazonSQS.ReceiveMessage");
        then.status(200).header("content-type", AMZ_JSON).json_body(json!({
            "Messages": [{"MessageId": "m-1", "ReceiptHandle": "rh-1", "Body": "{\"a\":1}"}]
        }));
    });
    let delete = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "AmazonSQS.DeleteMessage")
            .body_contains("rh-1");
        then.status(200).header("content-type", AMZ_JSON).body("{}");
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "AmazonSQS.GetQueueAttributes");
        then.status(200).header("content-type", AMZ_JSON).json_body(json!({
            "Attributes": {"ApproximateNumberOfMessages": "4"}
        }));
    });

    let queue = SqsQueue::new(queue_url, aws_config(&server)).expect("client should build");
    queue.send_message(json!({"a": 1})).expect("send should succeed");
    send.assert();

    let message = queue.receive_message().unwrap().expect("message should arrive");
    assert_eq!(message.handle, "rh-1");
    assert_eq!(message.body, json!({"a": 1}));
    queue.delete_message(&message.handle).unwrap();
    delete.assert();

    assert_eq!(queue.get_message_count().unwrap(), 4);
}

#[test]
fn test_sqs_string_body_keeps_its_type() {
    let server = MockServer::start();
    let send = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "AmazonSQS.SendMessage")
            .body_contains(r#""MessageBody":"\"{\\\"a\\\":1}\"""#);
        then.status(200)
            .header("content-type", AMZ_JSON)
            .json_body(json!({"MessageId": "m-2"}));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "AmazonSQS.ReceiveMessage");
        then.status(200).header("content-type", AMZ_JSON).json_body(json!({
            "Messages": [{"MessageId": "m-2", "ReceiptHandle": "rh-2", "Body": "\"{\\\"a\\\":1}\""}]
        }));
    });

    let queue = SqsQueue::new(server.url("/000000000000/jobs"), aws_config(&server))
        .expect("client should build");
    let body = json!("{\"a\":1}");
    queue.send_message(body.clone()).expect("send should succeed");
    send.assert();

    let message = queue.receive_message().unwrap().expect("message should arrive");
    assert_eq!(message.body, body);
}

#[test]
fn test_azure_queue_round_trip() {
    let server = MockServer::start();
    let conn = format!(
        "QueueEndpoint={}/devstoreaccount1;SharedAccessSignature=sv=2019-12-12&sig=abc",
        server.base_url()
    );
    let send = server.mock(|when, then| {
        when.method(POST)
            .path("/devstoreaccount1/jobs/messages")
            .query_param("sig", "abc")
            .body_contains("<MessageText>{&quot;a&quot;:1}</MessageText>");
        then.status(201);
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/devstoreaccount1/jobs/messages")
            .query_param("numofmessages", "1");
        then.status(200).body(
            "<QueueMessagesList><QueueMessage><MessageId>m1</MessageId>\
             <PopReceipt>pr-1</PopReceipt>\
             <MessageText>{&quot;a&quot;:1}</MessageText></QueueMessage></QueueMessagesList>",
        );
    });
    let delete = server.mock(|when, then| {
        when.method(DELETE)
            .path("/devstoreaccount1/jobs/messages/m1")
            .query_param("popreceipt", "pr-1");
        then.status(204);
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/devstoreaccount1/jobs")
            .query_param("comp", "metadata");
        then.status(200).header("x-ms-approximate-messages-count", "5");
    });

    let queue = AzureQueue::new(&conn, "jobs").expect("client should build");
    queue.send_message(json!({"a": 1})).expect("send should succeed");
    send.assert();

    let message = queue.receive_message().unwrap().expect("message should arrive");
    assert_eq!(message.handle, "m1|pr-1");
    assert_eq!(message.body, json!({"a": 1}));
    queue.delete_message(&message.handle).unwrap();
    delete.assert();

    assert_eq!(queue.get_message_count().unwrap(), 5);
}

#[test]
fn test_azure_empty_queue() {
    let server = MockServer::start();
    let conn = format!(
        "QueueEndpoint={}/acct;SharedAccessSignature=sig=abc",
        server.base_url()
    );
    server.mock(|when, then| {
        when.method(GET).path("/acct/jobs/messages");
        then.status(200).body("<QueueMessagesList />");
    });

    let queue = AzureQueue::new(&conn, "jobs").unwrap();
    assert!(queue.receive_message().unwrap().is_none());
}

#[test]
fn test_cognito_login_user_refresh_logout() {
    let server = MockServer::start();
    let target = |op: &str| format!("AWSCognitoIdentityProviderService.{}", op);

    server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("InitiateAuth"))
            .body_contains("USER_PASSWORD_AUTH")
            .body_contains(r#""PASSWORD":"right-password""#);
        then.status(200).json_body(json!({
            "AuthenticationResult": {"AccessToken": "at-1", "IdToken": "id-1", "RefreshToken": "rt-1"}
        }));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("InitiateAuth"))
            .body_contains(r#""PASSWORD":"wrong-password""#);
        then.status(400).json_body(json!({
            "__type": "NotAuthorizedException",
            "message": "Incorrect username or password."
        }));
    });
    let refresh = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("InitiateAuth"))
            .body_contains("REFRESH_TOKEN_AUTH")
            .body_contains("rt-1");
        then.status(200)
            .json_body(json!({"AuthenticationResult": {"AccessToken": "at-2"}}));
    });
    server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("GetUser"))
            .body_contains("at-1");
        then.status(200).json_body(json!({
            "Username": "alice",
            "UserAttributes": [
                {"Name": "sub", "Value": "u-1"},
                {"Name": "email", "Value": "alice@example.com"},
                {"Name": "custom:roles", "Value": "editor"}
            ]
        }));
    });
    let sign_out = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", target("GlobalSignOut"))
            .body_contains("at-2");
        then.status(200).json_body(json!({}));
    });

    let provider = CognitoAuthProvider::new("us-east-1", "client", None, Some(&server.base_url()))
        .expect("provider should build");

    assert!(provider.authenticate("alice", "wrong-password").unwrap().is_none());

    let token = provider
        .authenticate("alice", "right-password")
        .unwrap()
        .expect("login should succeed");
    assert_eq!(token, "at-1");

    let identity = provider.get_user(&token).unwrap().expect("token should resolve");
    assert_eq!(identity.id, "u-1");
    assert_eq!(identity.roles, vec!["editor"]);

    let refreshed = provider.refresh_token(&token).unwrap().expect("refresh should succeed");
    refresh.assert();
    assert_eq!(refreshed, "at-2");

    assert!(provider.logout(&refreshed).unwrap());
    sign_out.assert();
}

#[test]
fn test_cognito_sign_up_conflict_is_invalid_input() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "AWSCognitoIdentityProviderService.SignUp");
        then.status(400).json_body(json!({
            "__type": "UsernameExistsException",
            "message": "User already exists"
        }));
    });

    let provider =
        CognitoAuthProvider::new("us-east-1", "client", None, Some(&server.base_url())).unwrap();
    let err = provider.register_user("alice", "password123").unwrap_err();
    assert!(matches!(err, backplane_core::BackplaneError::InvalidInput(_)));
}

fn cognito_error(server: &MockServer, operation: &str, status: u16, code: &str) {
    let target = format!("AWSCognitoIdentityProviderService.{}", operation);
    let code = code.to_string();
    server.mock(move |when, then| {
        when.method(POST).path("/").header("x-amz-target", target);
        then.status(status)
            .json_body(json!({"__type": code, "message": "from mock"}));
    });
}

fn cognito(server: &MockServer) -> CognitoAuthProvider {
    CognitoAuthProvider::new("us-east-1", "client", None, Some(&server.base_url()))
        .expect("provider should build")
}

#[test]
fn test_cognito_outage_is_an_error_not_a_rejection() {
    let server = MockServer::start();
    cognito_error(&server, "InitiateAuth", 500, "InternalErrorException");
    let err = cognito(&server).authenticate("alice", "password123").unwrap_err();
    assert_eq!(err.service_code(), Some("InternalErrorException"));
}

#[test]
fn test_cognito_throttling_is_an_error() {
    let server = MockServer::start();
    cognito_error(&server, "GetUser", 400, "TooManyRequestsException");
    cognito_error(&server, "GlobalSignOut", 400, "TooManyRequestsException");
    let provider = cognito(&server);
    assert!(provider.get_user("at-1").is_err());
    assert!(provider.logout("at-1").is_err());
}

#[test]
fn test_cognito_rejected_token_is_none() {
    let server = MockServer::start();
    cognito_error(&server, "GetUser", 400, "NotAuthorizedException");
    cognito_error(&server, "GlobalSignOut", 400, "NotAuthorizedException");
    let provider = cognito(&server);
    assert!(provider.get_user("expired").unwrap().is_none());
    assert!(!provider.logout("expired").unwrap());
}

#[test]
fn test_cognito_unconfirmed_user_cannot_log_in() {
    let server = MockServer::start();
    cognito_error(&server, "InitiateAuth", 400, "UserNotConfirmedException");
    assert!(cognito(&server).authenticate("alice", "password123").unwrap().is_none());
}

#[test]
fn test_cognito_expired_sessions_are_dropped() {
    let server = MockServer::start();
    for n in 1..=3 {
        server.mock(move |when, then| {
            when.method(POST)
                .path("/")
                .header("x-amz-target", "AWSCognitoIdentityProviderService.InitiateAuth")
                .body_contains(format!(r#""PASSWORD":"password-{}""#, n));
            then.status(200).json_body(json!({
                "AuthenticationResult": {
                    "AccessToken": format!("at-{}", n),
                    "RefreshToken": format!("rt-{}", n),
                    "ExpiresIn": 0
                }
            }));
        });
    }

    let provider = cognito(&server);
    for n in 1..=3 {
        let password = format!("password-{}", n);
        assert!(provider.authenticate("alice", &password).unwrap().is_some());
    }
    assert_eq!(provider.session_count(), 1);
}
