//! Credential checks and cookie sessions.
//!
//! ## Secret rotation
//!
//! Session secrets are ordered newest first. Only the first one signs new
//! sessions; all of them are trusted when verifying. To rotate, prepend a new
//! secret and drop the old one once sessions signed with it have expired
//! (at most `max_age_seconds` later).
//!
//! > **Warning:** Removing a secret immediately signs out every session that
//! > was issued with it.

pub(crate) mod codec;
mod error;
mod password;
mod repository;
mod service;
mod store;

pub use codec::{CodecError, SessionPayload, decode, encode};
pub use error::AuthError;
pub use password::{DEFAULT_BCRYPT_COST, PasswordHasher};
pub use repository::{
    MemoryUserRepository, NewUser, NewUserRecord, PgUserRepository, Profile, RegistrationFields,
    RepoFuture, UserRecord, UserRepository,
};
pub use service::{
    AuthService, Credentials, CurrentUser, LOGIN_PATH, LOGIN_REDIRECT, LogoutIssued,
    REDIRECT_TO_PARAM, REGISTER_REDIRECT, RequireUser, SessionIssued, login_redirect_target,
    normalize_email,
};
pub use store::{
    DEFAULT_SESSION_COOKIE_NAME, DEFAULT_SESSION_MAX_AGE_SECONDS, DeploymentMode, SameSite,
    SessionConfig, SessionStore,
};

#[cfg(test)]
mod tests;
