//! Azure Storage Queue over the REST API.
//!
//! Connection strings carry either an account key (requests are signed with
//! SharedKeyLite) or a shared access signature appended to every URL.
//! Message handles are `<message id>|<pop receipt>`.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::blocking::{Client, Response};
use reqwest::{Method, Url};
use serde_json::Value;
use sha2::Sha256;
use urlencoding::encode;

use super::traits::QueueClient;
use super::types::{decode_body, encode_body, Message};
use crate::config::REDACTED;
use crate::error::{BackplaneError, Result};
use crate::xml;

const SERVICE: &str = "Azure Queue";
const API_VERSION: &str = "2019-12-12";
const COUNT_HEADER: &str = "x-ms-approximate-messages-count";

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
enum Credential {
    SharedKey { account: String, key: Vec<u8> },
    Sas(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::SharedKey { account, .. } => {
                write!(f, "SharedKey {{ account: {:?}, key: {} }}", account, REDACTED)
            }
            Credential::Sas(_) => write!(f, "Sas({})", REDACTED),
        }
    }
}

/// Parsed storage connection string.
#[derive(Debug, Clone)]
struct Connection {
    queue_endpoint: String,
    credential: Credential,
}

fn parse_connection_string(raw: &str) -> Result<Connection> {
    let mut account = None;
    let mut key = None;
    let mut protocol = "https".to_string();
    let mut suffix = "core.windows.net".to_string();
    let mut queue_endpoint = None;
    let mut sas = None;

    for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((name, value)) = part.split_once('=') else {
            return Err(BackplaneError::Config(format!(
                "Malformed connection string segment: {}",
                part
            )));
        };
        match name {
            "AccountName" => account = Some(value.to_string()),
            "AccountKey" => key = Some(value.to_string()),
            "DefaultEndpointsProtocol" => protocol = value.to_string(),
            "EndpointSuffix" => suffix = value.to_string(),
            "QueueEndpoint" => queue_endpoint = Some(value.trim_end_matches('/').to_string()),
            "SharedAccessSignature" => sas = Some(value.trim_start_matches('?').to_string()),
            _ => {}
        }
    }

    let queue_endpoint = match (queue_endpoint, &account) {
        (Some(endpoint), _) => endpoint,
        (None, Some(account)) => format!("{}://{}.queue.{}", protocol, account, suffix),
        (None, None) => {
            return Err(BackplaneError::Config(
                "Connection string needs AccountName or QueueEndpoint".to_string(),
            ))
        }
    };

    let credential = match (account, key, sas) {
        (_, _, Some(sas)) => Credential::Sas(sas),
        (Some(account), Some(key), None) => {
            let key = STANDARD
                .decode(key)
                .map_err(|e| BackplaneError::Config(format!("Invalid AccountKey: {}", e)))?;
            Credential::SharedKey { account, key }
        }
        _ => {
            return Err(BackplaneError::Config(
                "Connection string needs AccountKey or SharedAccessSignature".to_string(),
            ))
        }
    };

    Ok(Connection {
        queue_endpoint,
        credential,
    })
}

/// SharedKeyLite string-to-sign for the Queue service.
fn string_to_sign(
    method: &str,
    content_type: &str,
    ms_headers: &[(&str, String)],
    url: &Url,
    account: &str,
) -> String {
    let mut headers: Vec<(String, &str)> = ms_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.as_str()))
        .collect();
    headers.sort();
    let canonical_headers: String = headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();

    let mut resource = format!("/{}{}", account, url.path());
    if let Some((_, comp)) = url.query_pairs().find(|(name, _)| name == "comp") {
        resource.push_str("?comp=");
        resource.push_str(&comp);
    }

    format!(
        "{}\n\n{}\n\n{}{}",
        method, content_type, canonical_headers, resource
    )
}

fn sign(key: &[u8], text: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| BackplaneError::Config(format!("Invalid AccountKey: {}", e)))?;
    mac.update(text.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn error_from(response: Response) -> BackplaneError {
    let status = response.status();
    let header_code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().unwrap_or_default();
    let code = header_code
        .or_else(|| xml::element_text(&body, "Code"))
        .unwrap_or_else(|| status.as_u16().to_string());
    let message = xml::element_text(&body, "Message").unwrap_or_else(|| status.to_string());
    BackplaneError::service(SERVICE, code, message)
}

#[derive(Debug, Clone)]
pub struct AzureQueue {
    http: Client,
    connection: Connection,
    queue_name: String,
}

impl AzureQueue {
    pub fn new(connection_string: &str, queue_name: impl Into<String>) -> Result<Self> {
        let queue_name = queue_name.into();
        if queue_name.is_empty() {
            return Err(BackplaneError::Config(
                "Azure queue requires a queue_name".to_string(),
            ));
        }
        let connection = parse_connection_string(connection_string)?;
        tracing::info!(endpoint = %connection.queue_endpoint, queue = %queue_name, "Azure queue initialised");
        Ok(AzureQueue {
            http: Client::builder().build()?,
            connection,
            queue_name,
        })
    }

    /// `path` is relative to the queue ("messages", "messages/<id>", "").
    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut raw = format!("{}/{}", self.connection.queue_endpoint, self.queue_name);
        if !path.is_empty() {
            raw.push('/');
            raw.push_str(path);
        }
        let mut params: Vec<String> = query
            .iter()
            .map(|(name, value)| format!("{}={}", name, encode(value)))
            .collect();
        if let Credential::Sas(sas) = &self.connection.credential {
            params.push(sas.clone());
        }
        if !params.is_empty() {
            raw.push('?');
            raw.push_str(&params.join("&"));
        }
        Url::parse(&raw).map_err(|e| BackplaneError::Config(format!("Invalid queue URL: {}", e)))
    }

    fn request(&self, method: Method, url: Url, body: Option<String>) -> Result<Response> {
        let content_type = if body.is_some() { "application/xml" } else { "" };
        let ms_headers = vec![
            ("x-ms-date", Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()),
            ("x-ms-version", API_VERSION.to_string()),
        ];

        let mut builder = self.http.request(method.clone(), url.clone());
        if let Credential::SharedKey { account, key } = &self.connection.credential {
            let text = string_to_sign(method.as_str(), content_type, &ms_headers, &url, account);
            let authorization = format!("SharedKeyLite {}:{}", account, sign(key, &text)?);
            builder = builder.header("authorization", authorization);
        }
        for (name, value) in ms_headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = body {
            builder = builder.header("content-type", content_type).body(body);
        }

        let response = builder.send()?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(error_from(response))
        }
    }
}

impl QueueClient for AzureQueue {
    fn name(&self) -> &'static str {
        "azure"
    }

    fn send_message(&self, body: Value) -> Result<()> {
        let payload = format!(
            "<QueueMessage><MessageText>{}</MessageText></QueueMessage>",
            xml::escape(&encode_body(&body)?)
        );
        self.request(Method::POST, self.url("messages", &[])?, Some(payload))?;
        Ok(())
    }

    fn receive_message(&self) -> Result<Option<Message>> {
        let url = self.url("messages", &[("numofmessages", "1")])?;
        let listing = self.request(Method::GET, url, None)?.text()?;

        let (Some(id), Some(receipt)) = (
            xml::element_text(&listing, "MessageId"),
            xml::element_text(&listing, "PopReceipt"),
        ) else {
            return Ok(None);
        };
        let text = xml::element_text(&listing, "MessageText").unwrap_or_default();
        Ok(Some(Message {
            handle: format!("{}|{}", id, receipt),
            body: decode_body(text),
        }))
    }

    fn delete_message(&self, handle: &str) -> Result<()> {
        let (id, receipt) = handle.split_once('|').ok_or_else(|| {
            BackplaneError::InvalidInput(format!("Invalid Azure message handle: {}", handle))
        })?;
        let url = self.url(&format!("messages/{}", encode(id)), &[("popreceipt", receipt)])?;
        self.request(Method::DELETE, url, None)?;
        Ok(())
    }

    fn get_message_count(&self) -> Result<usize> {
        let url = self.url("", &[("comp", "metadata")])?;
        let response = self.request(Method::GET, url, None)?;
        let raw = response
            .headers()
            .get(COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("0");
        raw.parse()
            .map_err(|_| BackplaneError::Queue(format!("Invalid message count: {}", raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_CONN: &str = "DefaultEndpointsProtocol=https;AccountName=acct;\
                            AccountKey=c2VjcmV0;EndpointSuffix=core.windows.net";

    #[test]
    fn test_account_key_connection_string() {
        let conn = parse_connection_string(KEY_CONN).unwrap();
        assert_eq!(conn.queue_endpoint, "https://acct.queue.core.windows.net");
        match conn.credential {
            Credential::SharedKey { account, key } => {
                assert_eq!(account, "acct");
                assert_eq!(key, b"secret".to_vec());
            }
            Credential::Sas(_) => panic!("expected shared key"),
        }
    }

    #[test]
    fn test_sas_connection_string_appends_signature() {
        let queue = AzureQueue::new(
            "QueueEndpoint=http://127.0.0.1:10001/devstore/;SharedAccessSignature=?sv=1&sig=abc",
            "jobs",
        )
        .unwrap();
        let url = queue.url("messages", &[("numofmessages", "1")]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:10001/devstore/jobs/messages?numofmessages=1&sv=1&sig=abc"
        );
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = parse_connection_string("AccountName=acct").unwrap_err();
        assert!(matches!(err, BackplaneError::Config(_)));
    }

    #[test]
    fn test_string_to_sign_layout() {
        let url = Url::parse("https://acct.queue.core.windows.net/jobs?comp=metadata").unwrap();
        let headers = vec![
            ("x-ms-version", API_VERSION.to_string()),
            ("x-ms-date", "Mon, 01 Jan 2024 00:00:00 GMT".to_string()),
        ];
        assert_eq!(
            string_to_sign("GET", "", &headers, &url, "acct"),
            "GET\n\n\n\nx-ms-date:Mon, 01 Jan 2024 00:00:00 GMT\nx-ms-version:2019-12-12\n/acct/jobs?comp=metadata"
        );
    }

    #[test]
    fn test_bad_handle_is_invalid_input() {
        let queue = AzureQueue::new(KEY_CONN, "jobs").unwrap();
        let err = queue.delete_message("no-separator").unwrap_err();
        assert!(matches!(err, BackplaneError::InvalidInput(_)));
    }
}
