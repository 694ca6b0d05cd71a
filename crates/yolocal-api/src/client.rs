// Hub API HTTP client
//
// Every call goes through a single POST endpoint with a JSON envelope.
// The bearer token is fetched from the token manager per request, so a
// refresh is picked up by the very next call.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::auth::TokenManager;
use crate::error::Error;
use crate::models::{ApiEnvelope, ApiRequest, SUCCESS_CODE};

/// API endpoint path, relative to the hub base URL.
pub const API_PATH: &str = "/open/yolink/v2/api";

/// Raw HTTP client for the hub's JSON-RPC-style API.
///
/// Holds no state beyond the shared HTTP session and token manager, so it
/// is cheap to rebuild.
#[derive(Debug, Clone)]
pub struct HubClient {
    http: reqwest::Client,
    api_url: Url,
    tokens: Arc<TokenManager>,
}

impl HubClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &Url,
        tokens: Arc<TokenManager>,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            api_url: base_url.join(API_PATH)?,
            tokens,
        })
    }

    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Post one request envelope and return its `data` payload.
    ///
    /// A successful envelope with no `data` yields an empty object.
    pub async fn call(&self, request: &ApiRequest) -> Result<Value, Error> {
        let token = self.tokens.get_token().await?;
        debug!(method = %request.method, target = ?request.target_device, "POST {}", self.api_url);

        let resp = self
            .http
            .post(self.api_url.clone())
            .bearer_auth(token.expose())
            .json(request)
            .send()
            .await?;

        self.parse_envelope(resp).await
    }

    // ── Response handling ────────────────────────────────────────────

    async fn parse_envelope(&self, resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let raw: Value = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (url: {})", self.api_url),
            body: body.clone(),
        })?;

        match raw.get("code").and_then(Value::as_str) {
            Some(SUCCESS_CODE) => {
                let envelope: ApiEnvelope =
                    serde_json::from_value(raw).map_err(|e| Error::Deserialization {
                        message: format!("unexpected envelope shape: {e}"),
                        body,
                    })?;
                Ok(envelope
                    .data
                    .unwrap_or_else(|| Value::Object(serde_json::Map::new())))
            }
            code => Err(Error::Api {
                code: code.map_or_else(|| raw_field(&raw, "code"), str::to_owned),
                message: envelope_desc(&raw),
                response: raw,
            }),
        }
    }
}

/// A non-string envelope field, rendered as JSON (`""` when absent).
fn raw_field(raw: &Value, key: &str) -> String {
    raw.get(key).map(Value::to_string).unwrap_or_default()
}

fn envelope_desc(raw: &Value) -> String {
    match raw.get("desc").or_else(|| raw.get("msg")) {
        Some(Value::String(desc)) => desc.clone(),
        Some(Value::Null) | None => "no description".into(),
        Some(other) => other.to_string(),
    }
}
