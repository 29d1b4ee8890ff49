//! Error taxonomy for the authentication flow.

use thiserror::Error;

use super::repository::RegistrationFields;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or unusable startup configuration (e.g. no signing secret).
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Unknown email or wrong password; the two are never distinguished.
    #[error("Incorrect login")]
    InvalidCredentials,
    #[error("User already exists with that email")]
    EmailTaken,
    /// The repository could not create the user. Carries the submitted fields
    /// (never the password) so the form can be re-displayed.
    #[error("Something went wrong trying to create a new user.")]
    CreationFailed { fields: RegistrationFields },
    /// Bad signature, retired secret, expiry or malformed token.
    #[error("session is invalid")]
    SessionInvalid,
    #[error("failed to look up the session user")]
    UpstreamLookupFailure(#[source] anyhow::Error),
    #[error("internal error: {0}")]
    Internal(#[source] anyhow::Error),
}

impl AuthError {
    /// Message safe to show to the user.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "Incorrect login",
            Self::EmailTaken => "User already exists with that email",
            Self::CreationFailed { .. } => "Something went wrong trying to create a new user.",
            Self::Configuration(_)
            | Self::SessionInvalid
            | Self::UpstreamLookupFailure(_)
            | Self::Internal(_) => "Internal server error",
        }
    }
}
