//! # Kudos (login, registration and cookie sessions)
//!
//! `kudos` serves the login/registration flow of the kudos board: server-side
//! form validation, bcrypt password hashing, and stateless cookie sessions.
//!
//! ## Sessions
//!
//! A session is a signed, self-expiring token stored client-side in a single
//! `HttpOnly` cookie. The token carries only the user id and an absolute expiry,
//! authenticated with HMAC-SHA256 under the first configured secret. Every
//! configured secret is trusted for verification, so secrets can be rotated by
//! prepending a new one and retiring the old one later.
//!
//! A forged, tampered, expired or retired token is indistinguishable from no
//! session at all.
//!
//! ## Credentials
//!
//! Login failures never reveal whether the email is registered: an unknown
//! email and a wrong password produce the same `Incorrect login` response.

pub mod api;
pub mod auth;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
