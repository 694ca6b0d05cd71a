// Hub authentication
//
// Client-credential token grant against the hub and lazy, time-based
// refresh. The stored token is swapped as a whole on every refresh, so
// concurrent readers never see a token paired with another token's expiry.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Token endpoint path, relative to the hub base URL.
pub const TOKEN_PATH: &str = "/open/yolink/token";

/// A token is treated as expired this many seconds before its real expiry.
pub const REFRESH_BUFFER_SECS: i64 = 300;

/// Lifetime assumed when the grant response omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 7200;

// ── Clock ────────────────────────────────────────────────────────────

/// Source of "now" for expiry decisions. Injected so tests can move time.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ── AccessToken ──────────────────────────────────────────────────────

/// Bearer token plus absolute expiry. Immutable once issued.
#[derive(Debug, Clone)]
pub struct AccessToken {
    secret: SecretString,
    expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(secret: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            secret: SecretString::from(secret.into()),
            expires_at,
        }
    }

    /// The raw bearer string. Only for building request headers.
    pub fn expose(&self) -> &str {
        self.secret.expose_secret()
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// `false` once `now` is inside the refresh buffer before expiry.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(TimeDelta::seconds(REFRESH_BUFFER_SECS))
            .is_some_and(|deadline| now < deadline)
    }
}

// ── TokenManager ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenGrant {
    #[serde(default)]
    access_token: Option<String>,
    /// Seconds; hubs send an integer but any JSON number is accepted.
    #[serde(default)]
    expires_in: Option<f64>,
}

/// Owns the hub bearer token and refreshes it on demand.
///
/// Passive by construction: there is no background timer. Every
/// [`get_token`](Self::get_token) call checks expiry against the injected
/// [`Clock`] and refreshes synchronously when needed. Two callers racing
/// past an expired token may both refresh; the last grant wins.
pub struct TokenManager {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: SecretString,
    clock: Arc<dyn Clock>,
    current: ArcSwapOption<AccessToken>,
}

impl TokenManager {
    /// Create a token manager sharing the given HTTP session.
    ///
    /// `base_url` is the hub root, e.g. `http://192.168.1.50:1080`.
    pub fn new(
        http: reqwest::Client,
        base_url: &Url,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            token_url: base_url.join(TOKEN_PATH)?,
            client_id: client_id.into(),
            client_secret,
            clock: Arc::new(SystemClock),
            current: ArcSwapOption::empty(),
        })
    }

    /// Replace the clock used for expiry decisions.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The client id (also the MQTT username).
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The cached token, if any, without checking expiry.
    pub fn current(&self) -> Option<Arc<AccessToken>> {
        self.current.load_full()
    }

    /// Return a usable token, refreshing first if it is absent or about
    /// to expire.
    pub async fn get_token(&self) -> Result<Arc<AccessToken>, Error> {
        if let Some(token) = self.current.load_full() {
            if token.is_usable_at(self.clock.now()) {
                return Ok(token);
            }
            debug!(expires_at = %token.expires_at(), "access token inside refresh window");
        }
        self.refresh().await
    }

    /// Unconditionally request a new token from the hub.
    ///
    /// Every failure is reported as [`Error::Authentication`]. On failure
    /// the previously cached token is left in place.
    pub async fn refresh(&self) -> Result<Arc<AccessToken>, Error> {
        debug!(url = %self.token_url, client_id = %self.client_id, "requesting access token");

        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
        ];

        let resp = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|e| auth_error(format!("token request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| auth_error(format!("failed to read token response: {e}")))?;

        if !status.is_success() {
            return Err(auth_error(format!(
                "token endpoint returned HTTP {status}: {}",
                preview(&body)
            )));
        }

        let grant: TokenGrant = serde_json::from_str(&body)
            .map_err(|e| auth_error(format!("malformed token response: {e}")))?;

        let Some(secret) = grant.access_token.filter(|t| !t.is_empty()) else {
            return Err(auth_error(format!(
                "token response has no access_token: {}",
                preview(&body)
            )));
        };

        let lifetime = match grant.expires_in {
            None => TimeDelta::seconds(DEFAULT_EXPIRES_IN_SECS),
            Some(secs) => lifetime_from_secs(secs).ok_or_else(|| {
                auth_error(format!("token response has invalid expires_in: {secs}"))
            })?,
        };
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(lifetime)
            .ok_or_else(|| auth_error(format!("token expiry out of range: {lifetime}")))?;
        let token = Arc::new(AccessToken::new(secret, expires_at));

        self.current.store(Some(Arc::clone(&token)));
        debug!(expires_at = %token.expires_at(), "access token refreshed");
        Ok(token)
    }
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .field("has_token", &self.current.load().is_some())
            .finish_non_exhaustive()
    }
}

/// Acquire a token once to check that the hub accepts the credentials.
///
/// Returns [`Error::Authentication`] for rejected credentials and for an
/// unreachable hub alike; inspect the message to tell them apart.
pub async fn verify_credentials(
    base_url: &Url,
    client_id: &str,
    client_secret: SecretString,
    transport: &TransportConfig,
) -> Result<(), Error> {
    let http = transport.build_client()?;
    let manager = TokenManager::new(http, base_url, client_id, client_secret)?;
    manager.get_token().await?;
    Ok(())
}

/// `None` for negative, non-finite or unrepresentable lifetimes.
fn lifetime_from_secs(secs: f64) -> Option<TimeDelta> {
    let duration = Duration::try_from_secs_f64(secs).ok()?;
    TimeDelta::from_std(duration).ok()
}

fn auth_error(message: String) -> Error {
    Error::Authentication { message }
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(idx, _)| idx);
    &body[..end]
}
