//! Cookie-backed session store.
//!
//! Flow Overview: `create` signs the user id into a token and renders the
//! `Set-Cookie` value, `read` finds the named cookie in a request and decodes
//! it, `destroy` renders a cookie that expires immediately.

use axum::http::{HeaderValue, header::InvalidHeaderValue};
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, str::FromStr};
use tracing::debug;

use super::{
    codec::{self, SessionPayload},
    error::AuthError,
};

pub const DEFAULT_SESSION_COOKIE_NAME: &str = "kudos-session";
pub const DEFAULT_SESSION_MAX_AGE_SECONDS: i64 = 60 * 60 * 24 * 30;
const DEFAULT_COOKIE_PATH: &str = "/";

/// Where the service runs; decides whether cookies require HTTPS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentMode {
    Production,
    /// Local or loopback development only.
    Development,
}

impl DeploymentMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

impl FromStr for DeploymentMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" | "local" => Ok(Self::Development),
            other => Err(format!("invalid environment: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl SameSite {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "lax" => Ok(Self::Lax),
            "strict" => Ok(Self::Strict),
            "none" => Ok(Self::None),
            other => Err(format!("invalid SameSite value: {other}")),
        }
    }
}

/// Cookie policy and signing secrets, fixed at startup.
#[derive(Clone)]
pub struct SessionConfig {
    name: String,
    secrets: Vec<SecretString>,
    max_age_seconds: i64,
    secure: bool,
    http_only: bool,
    same_site: SameSite,
    path: String,
}

impl SessionConfig {
    /// `secrets` are ordered newest first. `Secure` is required everywhere
    /// except [`DeploymentMode::Development`].
    ///
    /// # Errors
    /// Returns [`AuthError::Configuration`] if no usable secret is given.
    pub fn new(secrets: Vec<SecretString>, mode: DeploymentMode) -> Result<Self, AuthError> {
        if secrets.is_empty() {
            return Err(AuthError::Configuration(
                "at least one session secret must be set".to_string(),
            ));
        }
        if secrets
            .iter()
            .any(|secret| secret.expose_secret().trim().is_empty())
        {
            return Err(AuthError::Configuration(
                "session secrets must not be blank".to_string(),
            ));
        }

        Ok(Self {
            name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
            secrets,
            max_age_seconds: DEFAULT_SESSION_MAX_AGE_SECONDS,
            secure: mode == DeploymentMode::Production,
            http_only: true,
            same_site: SameSite::Lax,
            path: DEFAULT_COOKIE_PATH.to_string(),
        })
    }

    /// # Errors
    /// Returns [`AuthError::Configuration`] if `name` is not a cookie-name token.
    pub fn with_name(mut self, name: String) -> Result<Self, AuthError> {
        if !is_cookie_name(&name) {
            return Err(AuthError::Configuration(format!(
                "invalid session cookie name: {name:?}"
            )));
        }
        self.name = name;
        Ok(self)
    }

    #[must_use]
    pub fn with_max_age_seconds(mut self, seconds: i64) -> Self {
        self.max_age_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: String) -> Self {
        self.path = path;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn secrets(&self) -> &[SecretString] {
        &self.secrets
    }

    #[must_use]
    pub fn max_age_seconds(&self) -> i64 {
        self.max_age_seconds
    }

    /// Browsers reject `SameSite=None` without `Secure`, so it implies it.
    #[must_use]
    pub fn secure(&self) -> bool {
        self.secure || self.same_site == SameSite::None
    }

    #[must_use]
    pub fn http_only(&self) -> bool {
        self.http_only
    }

    #[must_use]
    pub fn same_site(&self) -> SameSite {
        self.same_site
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("name", &self.name)
            .field("secrets", &format_args!("[***; {}]", self.secrets.len()))
            .field("max_age_seconds", &self.max_age_seconds)
            .field("secure", &self.secure())
            .field("http_only", &self.http_only)
            .field("same_site", &self.same_site)
            .field("path", &self.path)
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct SessionStore {
    config: SessionConfig,
}

impl SessionStore {
    #[must_use]
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Mint a session for `user_id` and render its `Set-Cookie` value.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if the token or header cannot be built.
    pub fn create(&self, user_id: &str) -> Result<HeaderValue, AuthError> {
        let token = codec::encode(
            &SessionPayload::new(user_id),
            self.config.secrets(),
            self.config.max_age_seconds(),
        )
        .map_err(|err| AuthError::Internal(err.into()))?;

        self.render(&token, self.config.max_age_seconds(), false)
            .map_err(|err| AuthError::Internal(err.into()))
    }

    /// Resolve the user id carried by a raw `Cookie` header, if any.
    #[must_use]
    pub fn read(&self, cookie_header: Option<&str>) -> Option<String> {
        let token = find_cookie(cookie_header?, self.config.name())?;
        let payload = codec::decode(token, self.config.secrets());
        if payload.is_none() {
            debug!("Ignoring cookie: {}", AuthError::SessionInvalid);
        }
        payload.map(|payload| payload.user_id)
    }

    /// Render a cookie that clears the session, valid or not.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if the header cannot be built.
    pub fn destroy(&self, cookie_header: Option<&str>) -> Result<HeaderValue, AuthError> {
        if cookie_header
            .and_then(|header| find_cookie(header, self.config.name()))
            .is_none()
        {
            debug!("Clearing session cookie that was not present");
        }

        self.render("", 0, true)
            .map_err(|err| AuthError::Internal(err.into()))
    }

    fn render(
        &self,
        value: &str,
        max_age_seconds: i64,
        expired: bool,
    ) -> Result<HeaderValue, InvalidHeaderValue> {
        let config = &self.config;
        let mut cookie = format!("{}={value}; Path={}", config.name(), config.path());
        if config.http_only() {
            cookie.push_str("; HttpOnly");
        }
        cookie.push_str("; SameSite=");
        cookie.push_str(config.same_site().as_str());
        cookie.push_str(&format!("; Max-Age={max_age_seconds}"));
        if expired {
            cookie.push_str("; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
        }
        // Only mark cookies secure outside local development.
        if config.secure() {
            cookie.push_str("; Secure");
        }
        HeaderValue::from_str(&cookie)
    }
}

/// RFC 6265 cookie-name: a non-empty token of visible ASCII without separators.
fn is_cookie_name(name: &str) -> bool {
    const SEPARATORS: &[u8] = b"()<>@,;:\\\"/[]?={}";
    !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte.is_ascii_graphic() && !SEPARATORS.contains(&byte))
}

/// Find a cookie value by name in a `Cookie` header.
fn find_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        if key.trim() != name {
            return None;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|inner| inner.strip_suffix('"'))
            .unwrap_or(value);
        (!value.is_empty()).then_some(value)
    })
}
