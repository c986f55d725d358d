//! REST client for the EcoTrack backend.
//!
//! Every endpoint tolerates the response shapes the backend has used over
//! time: bare values, `{"success": true, "data": ...}` envelopes and
//! collection wrappers such as `{"activities": [...]}`.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::config::ApiConfig;
use crate::models::{
    Activity, AuthSession, Category, ChatReply, ChatRequest, Conversation, GeoLocation, LoginRequest,
    PasswordChange, ProfileUpdate, RawChatReply, Recommendation, RegisterRequest, Summary, User,
};
use crate::submission::NewActivity;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("{message} (HTTP {status})")]
    HttpError { status: u16, message: String },
    #[error("{0}")]
    RejectedError(String),
    #[error("Unexpected response from server: {0}")]
    DecodeError(String),
    #[error("Please log in first")]
    NotAuthenticated,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// The backend no longer accepts the stored token
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::NotAuthenticated)
            || matches!(self, ApiError::HttpError { status, .. } if *status == StatusCode::UNAUTHORIZED.as_u16())
    }
}

/// Pull a human-readable message out of an error body.
/// Field names tried in order: message, error, msg, detail, errors[0].
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    message_from_value(&value)
}

fn message_from_value(value: &Value) -> Option<String> {
    fn text(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Object(map) => ["message", "msg", "detail"]
                .iter()
                .find_map(|key| map.get(*key).and_then(text)),
            _ => None,
        }
    }

    for key in ["message", "error", "msg", "detail"] {
        if let Some(message) = value.get(key).and_then(text) {
            return Some(message);
        }
    }
    value.get("errors").and_then(|errors| errors.get(0)).and_then(text)
}

/// Descend through a `data` envelope and then the first wrapper key present
fn unwrap_payload(mut value: Value, keys: &[&str]) -> Value {
    if let Some(inner) = value.get_mut("data").map(Value::take) {
        if !inner.is_null() {
            value = inner;
        }
    }
    for key in keys {
        if let Some(inner) = value.get_mut(*key).map(Value::take) {
            if !inner.is_null() {
                return inner;
            }
        }
    }
    value
}

fn decode<T: DeserializeOwned>(value: Value, keys: &[&str]) -> Result<T, ApiError> {
    serde_json::from_value(unwrap_payload(value, keys)).map_err(|e| ApiError::DecodeError(e.to_string()))
}

#[derive(Deserialize)]
struct RawAuthResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<User>,
}

/// Energy type options arrive as plain names or as objects
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEnergyType {
    Name(String),
    Entry {
        #[serde(alias = "type", alias = "label", alias = "value")]
        name: String,
    },
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .user_agent(concat!("ecotrack/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            config: config.clone(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        tracing::debug!(%method, %url, "API request");
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn authed(&self, method: Method, url: String) -> Result<RequestBuilder, ApiError> {
        if self.token.is_none() {
            return Err(ApiError::NotAuthenticated);
        }
        Ok(self.request(method, url))
    }

    /// Send and check the status; returns the parsed body (Null when empty)
    async fn send(&self, request: RequestBuilder) -> Result<Value, ApiError> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!(error = %e, "API request failed");
            ApiError::NetworkError(e)
        })?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = extract_error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string()
            });
            tracing::warn!(status = status.as_u16(), %message, "API returned an error");
            return Err(ApiError::HttpError {
                status: status.as_u16(),
                message,
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_str(&body).map_err(|e| ApiError::DecodeError(e.to_string()))?;

        // Some endpoints answer 200 with {"success": false, "message": ...}
        if value.get("success") == Some(&Value::Bool(false)) {
            let message = message_from_value(&value).unwrap_or_else(|| "Request was rejected".to_string());
            tracing::warn!(%message, "API rejected the request");
            return Err(ApiError::RejectedError(message));
        }
        Ok(value)
    }

    fn auth_session(value: Value, fallback_email: &str) -> Result<AuthSession, ApiError> {
        let raw: RawAuthResponse = decode(value, &[])?;
        let token = raw
            .access_token
            .or(raw.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::DecodeError("response did not include a token".to_string()))?;
        let user = raw.user.unwrap_or_else(|| User {
            email: fallback_email.to_string(),
            ..User::default()
        });
        Ok(AuthSession { token, user })
    }

    // Auth and profile

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, ApiError> {
        let value = self
            .send(self.request(Method::POST, self.config.auth_url("/register")).json(request))
            .await?;
        Self::auth_session(value, &request.email)
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthSession, ApiError> {
        let value = self
            .send(self.request(Method::POST, self.config.auth_url("/login")).json(request))
            .await?;
        Self::auth_session(value, &request.email)
    }

    pub async fn profile(&self) -> Result<User, ApiError> {
        let value = self
            .send(self.authed(Method::GET, self.config.auth_url("/profile"))?)
            .await?;
        decode(value, &["user"])
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        let value = self
            .send(self.authed(Method::PUT, self.config.auth_url("/profile"))?.json(update))
            .await?;
        decode(value, &["user"])
    }

    /// Returns the server's confirmation message
    pub async fn change_password(&self, change: &PasswordChange) -> Result<String, ApiError> {
        let value = self
            .send(self.authed(Method::PUT, self.config.auth_url("/change-password"))?.json(change))
            .await?;
        Ok(message_from_value(&value).unwrap_or_else(|| "Password updated".to_string()))
    }

    pub async fn delete_account(&self, password: &str) -> Result<(), ApiError> {
        self.send(
            self.authed(Method::DELETE, self.config.auth_url("/profile"))?
                .json(&serde_json::json!({ "password": password })),
        )
        .await?;
        Ok(())
    }

    // Activities

    pub async fn create_activity(&self, activity: &NewActivity) -> Result<Activity, ApiError> {
        let value = self
            .send(self.authed(Method::POST, self.config.url("/activities"))?.json(activity))
            .await?;
        let created: Activity = if value.is_null() {
            decode(serde_json::json!({}), &[])?
        } else {
            decode(value, &["activity"])?
        };
        Ok(activity.complete(created))
    }

    pub async fn list_activities(&self, category: Option<Category>) -> Result<Vec<Activity>, ApiError> {
        let mut request = self.authed(Method::GET, self.config.url("/activities"))?;
        if let Some(category) = category {
            request = request.query(&[("category", category.as_str())]);
        }
        let value = self.send(request).await?;
        decode(value, &["activities", "history"])
    }

    pub async fn summary(&self) -> Result<Summary, ApiError> {
        let value = self
            .send(self.authed(Method::GET, self.config.url("/activities/summary"))?)
            .await?;
        decode(value, &["summary"])
    }

    pub async fn history(&self, category: Option<Category>) -> Result<Vec<Activity>, ApiError> {
        let filter = category.map(|c| c.as_str()).unwrap_or("all");
        let value = self
            .send(
                self.authed(Method::GET, self.config.url("/activities/history"))?
                    .query(&[("filter", filter)]),
            )
            .await?;
        decode(value, &["activities", "history"])
    }

    /// Dropdown options for the energy form; no auth required
    pub async fn energy_types(&self) -> Result<Vec<String>, ApiError> {
        let value = self
            .send(self.request(Method::GET, self.config.url("/activities/energy-types")))
            .await?;
        let raw: Vec<RawEnergyType> = decode(value, &["energy_types", "types"])?;
        Ok(raw
            .into_iter()
            .map(|t| match t {
                RawEnergyType::Name(name) | RawEnergyType::Entry { name } => name,
            })
            .collect())
    }

    pub async fn delete_activity(&self, id: &str) -> Result<(), ApiError> {
        let url = self.activity_url(id)?;
        self.send(self.authed(Method::DELETE, url)?).await?;
        Ok(())
    }

    /// `/activities/{id}` with the id percent-encoded as a single segment
    fn activity_url(&self, id: &str) -> Result<String, ApiError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ApiError::InvalidRequest("activity has no id".to_string()));
        }
        let mut url = reqwest::Url::parse(&self.config.url("/activities"))
            .map_err(|e| ApiError::InvalidRequest(format!("bad base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidRequest("base URL cannot take a path".to_string()))?
            .push(id);
        Ok(url.to_string())
    }

    // Chatbot

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ApiError> {
        let value = self
            .send(self.authed(Method::POST, self.config.url("/chatbot/chat"))?.json(request))
            .await?;
        let raw: RawChatReply = decode(value, &[])?;
        let mut reply = raw
            .into_reply()
            .ok_or_else(|| ApiError::DecodeError("chat response had no reply text".to_string()))?;
        if reply.conversation_id.is_none() {
            reply.conversation_id = request.conversation_id.clone();
        }
        Ok(reply)
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        let value = self
            .send(self.authed(Method::GET, self.config.url("/chatbot/conversations"))?)
            .await?;
        decode(value, &["conversations"])
    }

    pub async fn recommendations(&self) -> Result<Vec<Recommendation>, ApiError> {
        let value = self
            .send(
                self.authed(Method::POST, self.config.url("/chatbot/recommendations"))?
                    .json(&serde_json::json!({})),
            )
            .await?;
        decode(value, &["recommendations", "tips"])
    }

    // Geocoding passthrough

    /// None when the address matched nothing
    pub async fn geocode(&self, address: &str) -> Result<Option<GeoLocation>, ApiError> {
        let value = self
            .send(
                self.request(Method::GET, self.config.url("/geocode"))
                    .query(&[("address", address)]),
            )
            .await?;
        Self::first_location(value)
    }

    pub async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<Option<GeoLocation>, ApiError> {
        let value = self
            .send(
                self.request(Method::GET, self.config.url("/reverse-geocode"))
                    .query(&[("lat", lat.to_string()), ("lng", lng.to_string())]),
            )
            .await?;
        let mut location = Self::first_location(value)?;
        // Some backends only return the address
        if let Some(found) = location.as_mut() {
            if found.lat == 0.0 && found.lng == 0.0 {
                found.lat = lat;
                found.lng = lng;
            }
        }
        Ok(location)
    }

    fn first_location(value: Value) -> Result<Option<GeoLocation>, ApiError> {
        match unwrap_payload(value, &["results", "location", "result"]) {
            Value::Null => Ok(None),
            Value::Array(items) => match items.into_iter().next() {
                Some(first) => decode(first, &[]).map(Some),
                None => Ok(None),
            },
            other => decode(other, &[]).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_url_encodes_and_rejects_empty_id() {
        let client = ApiClient::new(&ApiConfig::default()).unwrap();
        assert_eq!(
            client.activity_url("a1").unwrap(),
            "http://localhost:5000/api/activities/a1"
        );
        assert_eq!(
            client.activity_url("x/../y z").unwrap(),
            "http://localhost:5000/api/activities/x%2F..%2Fy%20z"
        );
        assert!(matches!(client.activity_url("  "), Err(ApiError::InvalidRequest(_))));
    }

    #[test]
    fn test_extract_error_message_field_order() {
        assert_eq!(
            extract_error_message(r#"{"message":"Invalid credentials","error":"x"}"#).as_deref(),
            Some("Invalid credentials")
        );
        assert_eq!(extract_error_message(r#"{"error":"Email taken"}"#).as_deref(), Some("Email taken"));
        assert_eq!(extract_error_message(r#"{"msg":"Token has expired"}"#).as_deref(), Some("Token has expired"));
        assert_eq!(extract_error_message(r#"{"detail":"Not found"}"#).as_deref(), Some("Not found"));
        assert_eq!(
            extract_error_message(r#"{"errors":["Password too short"]}"#).as_deref(),
            Some("Password too short")
        );
        assert_eq!(
            extract_error_message(r#"{"errors":[{"msg":"field required"}]}"#).as_deref(),
            Some("field required")
        );
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"nested"}}"#).as_deref(),
            Some("nested")
        );
    }

    #[test]
    fn test_extract_error_message_falls_through() {
        assert_eq!(extract_error_message("<html>Bad Gateway</html>"), None);
        assert_eq!(extract_error_message(r#"{"message":"  "}"#), None);
        assert_eq!(extract_error_message(r#"{"success":false}"#), None);
    }

    #[test]
    fn test_unwrap_payload_shapes() {
        let wrapped = serde_json::json!({"success": true, "data": {"activities": [1, 2]}});
        assert_eq!(unwrap_payload(wrapped, &["activities"]), serde_json::json!([1, 2]));

        let bare = serde_json::json!([3]);
        assert_eq!(unwrap_payload(bare, &["activities"]), serde_json::json!([3]));

        let keyed = serde_json::json!({"user": {"name": "Ada"}});
        assert_eq!(unwrap_payload(keyed, &["user"]), serde_json::json!({"name": "Ada"}));
    }

    #[test]
    fn test_auth_session_token_field_names() {
        let session = ApiClient::auth_session(
            serde_json::json!({"success": true, "access_token": "t1", "user": {"name": "Ada", "email": "a@x.org"}}),
            "a@x.org",
        )
        .unwrap();
        assert_eq!(session.token, "t1");
        assert_eq!(session.user.name, "Ada");

        let session = ApiClient::auth_session(serde_json::json!({"token": "t2"}), "b@x.org").unwrap();
        assert_eq!(session.token, "t2");
        assert_eq!(session.user.email, "b@x.org");

        assert!(matches!(
            ApiClient::auth_session(serde_json::json!({"user": {}}), "c@x.org"),
            Err(ApiError::DecodeError(_))
        ));
    }

    #[test]
    fn test_authed_requires_token() {
        let client = ApiClient::new(&ApiConfig::default()).unwrap();
        assert!(matches!(
            client.authed(Method::GET, "http://localhost/x".to_string()),
            Err(ApiError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_is_unauthorized() {
        assert!(ApiError::NotAuthenticated.is_unauthorized());
        assert!(ApiError::HttpError { status: 401, message: String::new() }.is_unauthorized());
        assert!(!ApiError::HttpError { status: 500, message: String::new() }.is_unauthorized());
    }
}
