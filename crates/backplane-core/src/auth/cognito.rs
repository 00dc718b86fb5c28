//! Amazon Cognito user pool provider over the JSON API.
//!
//! `authenticate` returns the access token, which is what `GetUser` and
//! `GlobalSignOut` accept. The refresh token issued alongside it is kept in
//! memory so `refresh_token` can be called with the access token; a raw
//! refresh token is accepted as well.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use reqwest::blocking::Client;
use serde_json::{json, Map, Value};
use sha2::Sha256;

use super::traits::AuthProvider;
use super::types::Identity;
use crate::aws::read_json_response;
use crate::error::{BackplaneError, Result};
use crate::storage::{record_from_value, Record};

const SERVICE: &str = "Cognito";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const ROLES_ATTRIBUTE: &str = "custom:roles";

/// Lifetime assumed for an access token when `ExpiresIn` is absent.
const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Codes meaning the credentials or token were rejected. Anything else is
/// a backend failure and is returned as an error.
const REJECTED_TOKEN: [&str; 2] = ["NotAuthorizedException", "UserNotFoundException"];
const REJECTED_LOGIN: [&str; 4] = [
    "NotAuthorizedException",
    "UserNotFoundException",
    "PasswordResetRequiredException",
    "UserNotConfirmedException",
];

/// `Ok(None)` for a rejection listed in `codes`, the error otherwise.
fn rejection<T>(err: BackplaneError, codes: &[&str]) -> Result<Option<T>> {
    let rejected = err.service_code().filter(|code| codes.contains(code));
    if let Some(code) = rejected {
        tracing::debug!(code, "Cognito rejected the request");
        return Ok(None);
    }
    Err(err)
}

/// Error codes that describe bad input to `SignUp`.
const INPUT_ERRORS: [&str; 3] = [
    "UsernameExistsException",
    "InvalidPasswordException",
    "InvalidParameterException",
];

/// `base64(HMAC-SHA256(client_secret, username + client_id))`.
pub fn secret_hash(client_secret: &str, username: &str, client_id: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(client_secret.as_bytes())
        .map_err(|e| BackplaneError::Config(format!("Invalid Cognito client secret: {}", e)))?;
    mac.update(username.as_bytes());
    mac.update(client_id.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build an identity from `GetUser` output.
fn identity_from_user(response: &Value) -> Option<Identity> {
    let attributes: HashMap<&str, &str> = response
        .get("UserAttributes")
        .and_then(Value::as_array)
        .map(|attrs| {
            attrs
                .iter()
                .filter_map(|a| Some((a.get("Name")?.as_str()?, a.get("Value")?.as_str()?)))
                .collect()
        })
        .unwrap_or_default();

    let username = response.get("Username").and_then(Value::as_str);
    let id = attributes.get("sub").copied().or(username)?.to_string();
    let email = attributes
        .get("email")
        .copied()
        .or(username)
        .unwrap_or(&id)
        .to_string();
    let roles = attributes
        .get(ROLES_ATTRIBUTE)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some(Identity { id, email, roles })
}

#[derive(Debug, Clone)]
struct Session {
    username: String,
    refresh_token: String,
    expires_at: Instant,
}

impl Session {
    fn from_result(username: String, refresh_token: String, result: &Value) -> Self {
        let expires_in = result
            .get("ExpiresIn")
            .and_then(Value::as_u64)
            .unwrap_or(DEFAULT_EXPIRES_IN);
        Session {
            username,
            refresh_token,
            expires_at: Instant::now() + Duration::from_secs(expires_in),
        }
    }
}

#[derive(Debug)]
pub struct CognitoAuthProvider {
    http: Client,
    endpoint: String,
    client_id: String,
    client_secret: Option<String>,
    sessions: Mutex<HashMap<String, Session>>,
}

impl CognitoAuthProvider {
    /// `endpoint` overrides `https://cognito-idp.<region>.amazonaws.com/`.
    pub fn new(
        region: &str,
        client_id: impl Into<String>,
        client_secret: Option<String>,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let client_id = client_id.into();
        if client_id.is_empty() {
            return Err(BackplaneError::Config(
                "Cognito requires cognito_client_id".to_string(),
            ));
        }
        let endpoint = match endpoint {
            Some(url) => format!("{}/", url.trim_end_matches('/')),
            None => format!("https://cognito-idp.{}.amazonaws.com/", region),
        };
        tracing::info!(endpoint = %endpoint, "Cognito provider initialised");
        Ok(CognitoAuthProvider {
            http: Client::builder().build()?,
            endpoint,
            client_id,
            client_secret,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    fn call(&self, operation: &str, payload: Value) -> Result<Value> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("content-type", CONTENT_TYPE)
            .header(
                "x-amz-target",
                format!("AWSCognitoIdentityProviderService.{}", operation),
            )
            .body(serde_json::to_vec(&payload)?)
            .send()?;
        read_json_response(SERVICE, response)
    }

    fn secret_hash_for(&self, username: &str) -> Result<Option<String>> {
        self.client_secret
            .as_deref()
            .map(|secret| secret_hash(secret, username, &self.client_id))
            .transpose()
    }

    fn initiate_auth(&self, flow: &str, parameters: Map<String, Value>) -> Result<Option<Value>> {
        let response = self.call(
            "InitiateAuth",
            json!({
                "AuthFlow": flow,
                "ClientId": self.client_id,
                "AuthParameters": parameters,
            }),
        );
        match response {
            Ok(body) => Ok(body.get("AuthenticationResult").cloned()),
            Err(err) => rejection(err, &REJECTED_LOGIN),
        }
    }

    /// Remember the refresh token behind `token`, dropping expired sessions.
    fn store_session(&self, token: String, session: Session) -> Result<()> {
        let mut sessions = self.sessions()?;
        let now = Instant::now();
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(token, session);
        Ok(())
    }

    /// Number of cached sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn sessions(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Session>>> {
        self.sessions
            .lock()
            .map_err(|_| BackplaneError::Auth("Cognito session cache poisoned".to_string()))
    }
}

fn access_token(result: &Value) -> Option<String> {
    result
        .get("AccessToken")
        .and_then(Value::as_str)
        .map(str::to_string)
}

impl AuthProvider for CognitoAuthProvider {
    fn name(&self) -> &'static str {
        "cognito"
    }

    fn register_user(&self, username: &str, password: &str) -> Result<Record> {
        let mut payload = json!({
            "ClientId": self.client_id,
            "Username": username,
            "Password": password,
            "UserAttributes": [{"Name": "email", "Value": username}],
        });
        if let Some(hash) = self.secret_hash_for(username)? {
            payload["SecretHash"] = Value::String(hash);
        }

        let response = match self.call("SignUp", payload) {
            Ok(response) => response,
            Err(err) if err.service_code().is_some_and(|c| INPUT_ERRORS.contains(&c)) => {
                return Err(BackplaneError::InvalidInput(err.to_string()))
            }
            Err(err) => return Err(err),
        };
        record_from_value(json!({
            "id": response.get("UserSub").cloned().unwrap_or(Value::String(username.to_string())),
            "email": username,
            "confirmed": response.get("UserConfirmed").cloned().unwrap_or(Value::Bool(false)),
        }))
    }

    fn authenticate(&self, username: &str, password: &str) -> Result<Option<String>> {
        let mut parameters = Map::new();
        parameters.insert("USERNAME".into(), json!(username));
        parameters.insert("PASSWORD".into(), json!(password));
        if let Some(hash) = self.secret_hash_for(username)? {
            parameters.insert("SECRET_HASH".into(), json!(hash));
        }

        let Some(result) = self.initiate_auth("USER_PASSWORD_AUTH", parameters)? else {
            return Ok(None);
        };
        let Some(token) = access_token(&result) else {
            return Ok(None);
        };
        if let Some(refresh) = result.get("RefreshToken").and_then(Value::as_str) {
            let session = Session::from_result(username.to_string(), refresh.to_string(), &result);
            self.store_session(token.clone(), session)?;
        }
        Ok(Some(token))
    }

    fn get_user(&self, token: &str) -> Result<Option<Identity>> {
        match self.call("GetUser", json!({ "AccessToken": token })) {
            Ok(response) => Ok(identity_from_user(&response)),
            Err(err) => rejection(err, &REJECTED_TOKEN),
        }
    }

    fn refresh_token(&self, old_token: &str) -> Result<Option<String>> {
        let session = {
            let mut sessions = self.sessions()?;
            let now = Instant::now();
            sessions.retain(|_, s| s.expires_at > now);
            sessions.get(old_token).cloned()
        };
        let (refresh, username) = match &session {
            Some(s) => (s.refresh_token.as_str(), Some(s.username.as_str())),
            None => (old_token, None),
        };

        let mut parameters = Map::new();
        parameters.insert("REFRESH_TOKEN".into(), json!(refresh));
        if let Some(username) = username {
            if let Some(hash) = self.secret_hash_for(username)? {
                parameters.insert("SECRET_HASH".into(), json!(hash));
            }
        }

        let Some(result) = self.initiate_auth("REFRESH_TOKEN_AUTH", parameters)? else {
            return Ok(None);
        };
        let Some(token) = access_token(&result) else {
            return Ok(None);
        };
        if let Some(session) = session {
            self.sessions()?.remove(old_token);
            let session = Session::from_result(session.username, session.refresh_token, &result);
            self.store_session(token.clone(), session)?;
        }
        Ok(Some(token))
    }

    fn logout(&self, token: &str) -> Result<bool> {
        match self.call("GlobalSignOut", json!({ "AccessToken": token })) {
            Ok(_) => {
                self.sessions()?.remove(token);
                Ok(true)
            }
            Err(err) => {
                rejection::<()>(err, &REJECTED_TOKEN)?;
                Ok(false)
            }
        }
    }
}
