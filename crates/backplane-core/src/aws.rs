//! Minimal AWS client shared by the S3, DynamoDB, SQS and Cognito backends.
//!
//! Requests are signed with SigV4 and sent over a blocking `reqwest` client.
//! Error payloads are mapped to `BackplaneError::Service` with the AWS error
//! code so callers can branch on e.g. `ResourceNotFoundException`.

use std::time::SystemTime;

use aws_credential_types::Credentials;
use aws_sigv4::http_request::{
    sign, PayloadChecksumKind, PercentEncodingMode, SignableBody, SignableRequest,
    SigningSettings, UriPathNormalizationMode,
};
use aws_sigv4::sign::v4;
use reqwest::blocking::{Client, Response};
use reqwest::{Method, Url};
use serde_json::Value;

use crate::config::REDACTED;
use crate::error::{BackplaneError, Result};

pub const DEFAULT_REGION: &str = "us-east-1";

/// Static AWS credentials.
#[derive(Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &REDACTED)
            .field("session_token", &self.session_token.as_ref().map(|_| REDACTED))
            .finish()
    }
}

impl AwsCredentials {
    /// Explicit keys win; otherwise fall back to `AWS_ACCESS_KEY_ID` /
    /// `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`.
    pub fn resolve(
        access_key_id: Option<&str>,
        secret_access_key: Option<&str>,
        session_token: Option<&str>,
    ) -> Option<Self> {
        if let (Some(access), Some(secret)) = (access_key_id, secret_access_key) {
            return Some(AwsCredentials {
                access_key_id: access.to_string(),
                secret_access_key: secret.to_string(),
                session_token: session_token.map(str::to_string),
            });
        }
        let access = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
        let secret = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
        Some(AwsCredentials {
            access_key_id: access,
            secret_access_key: secret,
            session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
        })
    }
}

/// Region, credentials and optional endpoint override for one service.
#[derive(Debug, Clone)]
pub struct AwsConfig {
    pub region: String,
    pub credentials: Option<AwsCredentials>,
    pub endpoint_url: Option<String>,
}

impl Default for AwsConfig {
    fn default() -> Self {
        AwsConfig {
            region: DEFAULT_REGION.to_string(),
            credentials: None,
            endpoint_url: None,
        }
    }
}

/// Blocking HTTP client bound to one AWS service signing name.
#[derive(Debug, Clone)]
pub struct AwsClient {
    http: Client,
    config: AwsConfig,
    service: &'static str,
    display_name: &'static str,
}

impl AwsClient {
    /// `service` is the SigV4 signing name ("s3", "dynamodb", "sqs").
    pub fn new(config: AwsConfig, service: &'static str, display_name: &'static str) -> Result<Self> {
        let http = Client::builder().build()?;
        Ok(AwsClient {
            http,
            config,
            service,
            display_name,
        })
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    pub fn endpoint_url(&self) -> Option<&str> {
        self.config
            .endpoint_url
            .as_deref()
            .map(|url| url.trim_end_matches('/'))
    }

    /// Sign and send a request. Non-2xx responses are returned as-is.
    pub fn send(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Vec<u8>,
    ) -> Result<Response> {
        let signed = self.sign_headers(method.as_str(), url, headers, &body)?;

        let mut request = self.http.request(method, url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        for (name, value) in signed {
            request = request.header(name, value);
        }
        Ok(request.body(body).send()?)
    }

    /// Call an AWS JSON-protocol operation (`X-Amz-Target: <target>`).
    ///
    /// # Errors
    ///
    /// Returns `BackplaneError::Service` carrying the AWS error code when the
    /// service rejects the call.
    pub fn json_call(
        &self,
        url: &str,
        content_type: &str,
        target: &str,
        payload: &Value,
    ) -> Result<Value> {
        let body = serde_json::to_vec(payload)?;
        let response = self.send(
            Method::POST,
            url,
            &[("content-type", content_type), ("x-amz-target", target)],
            body,
        )?;
        read_json_response(self.display_name, response)
    }

    fn sign_headers(
        &self,
        method: &str,
        url: &str,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<Vec<(String, String)>> {
        let credentials = self.config.credentials.as_ref().ok_or_else(|| {
            BackplaneError::Config(format!(
                "AWS credentials are required for {}",
                self.display_name
            ))
        })?;

        let host = host_header(url)?;
        let mut to_sign: Vec<(&str, &str)> = vec![("host", host.as_str())];
        to_sign.extend_from_slice(headers);

        let signable = SignableRequest::new(
            method,
            url,
            to_sign.iter().map(|(k, v)| (*k, *v)),
            SignableBody::Bytes(body),
        )
        .map_err(signing_error)?;

        let identity = Credentials::new(
            &credentials.access_key_id,
            &credentials.secret_access_key,
            credentials.session_token.clone(),
            None,
            "backplane",
        )
        .into();

        let mut settings = SigningSettings::default();
        if self.service == "s3" {
            // S3 signs the already-encoded path as-is and wants the payload hash header.
            settings.payload_checksum_kind = PayloadChecksumKind::XAmzSha256;
            settings.percent_encoding_mode = PercentEncodingMode::Single;
            settings.uri_path_normalization_mode = UriPathNormalizationMode::Disabled;
        }

        let v4_params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.config.region)
            .name(self.service)
            .time(SystemTime::now())
            .settings(settings)
            .build()
            .map_err(signing_error)?;
        let params = aws_sigv4::http_request::SigningParams::from(v4_params);

        let output = sign(signable, &params).map_err(signing_error)?;
        Ok(output
            .output()
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

fn signing_error(err: impl std::fmt::Display) -> BackplaneError {
    BackplaneError::Other(format!("SigV4 signing failed: {}", err))
}

/// `host[:port]` as it will appear in the request's Host header.
pub(crate) fn host_header(url: &str) -> Result<String> {
    let parsed = Url::parse(url)
        .map_err(|e| BackplaneError::Config(format!("Invalid URL '{}': {}", url, e)))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| BackplaneError::Config(format!("URL has no host: {}", url)))?;
    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Decode a JSON-protocol response, mapping error payloads to `Service` errors.
pub(crate) fn read_json_response(service: &'static str, response: Response) -> Result<Value> {
    let status = response.status();
    let text = response.text()?;
    if status.is_success() {
        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        return Ok(serde_json::from_str(&text)?);
    }

    let payload: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
    let code = payload
        .get("__type")
        .and_then(Value::as_str)
        .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
        .unwrap_or_else(|| status.as_u16().to_string());
    let message = payload
        .get("message")
        .or_else(|| payload.get("Message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or(text);
    Err(BackplaneError::service(service, code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_header_keeps_non_default_port() {
        assert_eq!(
            host_header("http://127.0.0.1:4566/bucket/key").unwrap(),
            "127.0.0.1:4566"
        );
        assert_eq!(
            host_header("https://s3.us-east-1.amazonaws.com/").unwrap(),
            "s3.us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn test_explicit_credentials_win() {
        let creds = AwsCredentials::resolve(Some("AKID"), Some("secret"), None).unwrap();
        assert_eq!(creds.access_key_id, "AKID");
        assert!(creds.session_token.is_none());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = AwsCredentials::resolve(Some("AKID"), Some("topsecret"), Some("tok")).unwrap();
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("topsecret"));
        assert!(!rendered.contains("tok\""));
    }

    #[test]
    fn test_unsigned_request_without_credentials_is_config_error() {
        let client = AwsClient::new(AwsConfig::default(), "dynamodb", "DynamoDB").unwrap();
        let err = client
            .sign_headers("POST", "https://dynamodb.us-east-1.amazonaws.com/", &[], b"{}")
            .unwrap_err();
        assert!(matches!(err, BackplaneError::Config(_)));
    }
}
