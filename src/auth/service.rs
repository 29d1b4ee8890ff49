//! Login, registration and session lookups over a [`UserRepository`].
//!
//! Flow Overview: credentials are checked against the repository, a session
//! cookie is minted on success, and later requests resolve that cookie back
//! into a user id. Every outcome is a value the caller must match on; nothing
//! short-circuits through errors.

use axum::http::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use std::{fmt, sync::Arc};
use tracing::{debug, error, info, instrument};
use url::form_urlencoded;

use super::{
    error::AuthError,
    password::PasswordHasher,
    repository::{NewUser, NewUserRecord, UserRecord, UserRepository},
    store::SessionStore,
};

pub const LOGIN_PATH: &str = "/login";
pub const LOGIN_REDIRECT: &str = "/";
pub const REGISTER_REDIRECT: &str = "/home";
pub const REDIRECT_TO_PARAM: &str = "redirectTo";

// Verified when the email is unknown so both failure paths cost one bcrypt.
const DUMMY_PASSWORD: &str = "kudos-dummy-password";

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

/// A freshly minted session and where to send the browser next.
#[derive(Debug)]
pub struct SessionIssued {
    pub user_id: String,
    pub set_cookie: HeaderValue,
    pub redirect_to: String,
}

/// A cleared session; always redirects to the login page.
#[derive(Debug)]
pub struct LogoutIssued {
    pub set_cookie: HeaderValue,
    pub redirect_to: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum RequireUser {
    Authenticated(String),
    /// Send the browser to this login URL and stop handling the request.
    RedirectRequired(String),
}

#[derive(Debug)]
pub enum CurrentUser {
    Anonymous,
    Authenticated(UserRecord),
    /// The session could not be resolved; the cookie must be cleared.
    ForcedLogout(LogoutIssued),
}

pub struct AuthService {
    store: SessionStore,
    hasher: PasswordHasher,
    users: Arc<dyn UserRepository>,
    dummy_hash: String,
}

impl fmt::Debug for AuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthService")
            .field("store", &self.store)
            .field("hasher", &self.hasher)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// # Errors
    /// Returns [`AuthError::Configuration`] if the hasher cannot produce hashes.
    pub fn new(
        store: SessionStore,
        hasher: PasswordHasher,
        users: Arc<dyn UserRepository>,
    ) -> Result<Self, AuthError> {
        let dummy_hash = hasher
            .hash(DUMMY_PASSWORD)
            .map_err(|err| AuthError::Configuration(format!("{err:#}")))?;

        Ok(Self {
            store,
            hasher,
            users,
            dummy_hash,
        })
    }

    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Anonymous → Authenticated on a matching email and password.
    ///
    /// # Errors
    /// [`AuthError::InvalidCredentials`] for an unknown email or a wrong
    /// password alike; [`AuthError::Internal`] on repository faults.
    #[instrument(skip_all)]
    pub async fn login(&self, credentials: Credentials) -> Result<SessionIssued, AuthError> {
        let email = normalize_email(&credentials.email);

        let user = self.users.find_by_email(&email).await.map_err(|err| {
            error!("Failed to lookup login record: {err:#}");
            AuthError::Internal(err)
        })?;

        let (user_id, password_hash) = match user {
            Some(user) => (Some(user.id), user.password_hash),
            None => (None, self.dummy_hash.clone()),
        };

        let verified = self
            .verify_password(credentials.password, password_hash)
            .await;

        match user_id {
            Some(user_id) if verified => {
                info!("Login succeeded");
                self.issue(user_id, LOGIN_REDIRECT)
            }
            _ => {
                debug!("Login rejected");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Create an account and sign it in.
    ///
    /// # Errors
    /// [`AuthError::EmailTaken`] if the email is already registered,
    /// [`AuthError::CreationFailed`] if the repository cannot create the user.
    #[instrument(skip_all)]
    pub async fn register(&self, new_user: NewUser) -> Result<SessionIssued, AuthError> {
        let fields = new_user.fields();
        let email = normalize_email(&new_user.email);

        let existing = self.users.count_by_email(&email).await.map_err(|err| {
            error!("Failed to count users by email: {err:#}");
            AuthError::Internal(err)
        })?;
        if existing > 0 {
            debug!("Registration rejected: email taken");
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.hash_password(new_user.password).await?;
        let record = NewUserRecord {
            email,
            password_hash,
            profile: new_user.profile,
        };

        match self.users.create(&record).await {
            Ok(user) => {
                info!("Registered user {}", user.id);
                self.issue(user.id, REGISTER_REDIRECT)
            }
            Err(err) => {
                error!("Failed to create user: {err:#}");
                Err(AuthError::CreationFailed { fields })
            }
        }
    }

    /// Resolve the session or name the login URL to redirect to, carrying
    /// `redirect_to` as the return target.
    #[must_use]
    pub fn require_user_id(&self, cookie_header: Option<&str>, redirect_to: &str) -> RequireUser {
        match self.store.read(cookie_header) {
            Some(user_id) => RequireUser::Authenticated(user_id),
            None => RequireUser::RedirectRequired(login_redirect_target(redirect_to)),
        }
    }

    /// Load the session user.
    ///
    /// A repository fault forces a logout instead of surfacing to the caller;
    /// the fault itself is logged.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] only if the clearing cookie cannot be built.
    #[instrument(skip_all)]
    pub async fn get_user(&self, cookie_header: Option<&str>) -> Result<CurrentUser, AuthError> {
        let Some(user_id) = self.store.read(cookie_header) else {
            return Ok(CurrentUser::Anonymous);
        };

        self.load_user(&user_id, cookie_header).await
    }

    /// Load the user behind an already verified session, as resolved by
    /// [`Self::require_user_id`]. Faults are handled as in [`Self::get_user`].
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] only if the clearing cookie cannot be built.
    #[instrument(skip_all)]
    pub async fn load_user(
        &self,
        user_id: &str,
        cookie_header: Option<&str>,
    ) -> Result<CurrentUser, AuthError> {
        match self.users.find_by_id(user_id).await {
            Ok(Some(user)) => Ok(CurrentUser::Authenticated(user)),
            Ok(None) => {
                debug!("Session refers to a missing user");
                Ok(CurrentUser::Anonymous)
            }
            Err(err) => {
                let fault = AuthError::UpstreamLookupFailure(err);
                error!(error = ?fault, "Forcing logout after session user lookup failed");
                Ok(CurrentUser::ForcedLogout(self.logout(cookie_header)?))
            }
        }
    }

    /// Authenticated/Anonymous → Anonymous, unconditionally.
    ///
    /// # Errors
    /// Returns [`AuthError::Internal`] if the clearing cookie cannot be built.
    pub fn logout(&self, cookie_header: Option<&str>) -> Result<LogoutIssued, AuthError> {
        Ok(LogoutIssued {
            set_cookie: self.store.destroy(cookie_header)?,
            redirect_to: LOGIN_PATH.to_string(),
        })
    }

    fn issue(&self, user_id: String, redirect_to: &str) -> Result<SessionIssued, AuthError> {
        let set_cookie = self.store.create(&user_id)?;
        Ok(SessionIssued {
            user_id,
            set_cookie,
            redirect_to: redirect_to.to_string(),
        })
    }

    async fn hash_password(&self, password: SecretString) -> Result<String, AuthError> {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.hash(password.expose_secret()))
            .await
            .map_err(|err| AuthError::Internal(err.into()))?
            .map_err(AuthError::Internal)
    }

    async fn verify_password(&self, password: SecretString, password_hash: String) -> bool {
        let hasher = self.hasher;
        tokio::task::spawn_blocking(move || hasher.verify(password.expose_secret(), &password_hash))
            .await
            .unwrap_or(false)
    }
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// `/login?redirectTo=<path>` with the path form-encoded.
#[must_use]
pub fn login_redirect_target(redirect_to: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(REDIRECT_TO_PARAM, redirect_to)
        .finish();
    format!("{LOGIN_PATH}?{query}")
}
