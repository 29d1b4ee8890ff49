//! Auth module tests.

use super::{
    AuthError, AuthService, Credentials, CurrentUser, DeploymentMode, MemoryUserRepository,
    NewUser, NewUserRecord, PasswordHasher, Profile, RepoFuture, RequireUser, SessionConfig,
    SessionStore, UserRecord, UserRepository, login_redirect_target, normalize_email,
};
use anyhow::{Context, Result, anyhow};
use axum::http::HeaderValue;
use secrecy::SecretString;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

const EMAIL: &str = "a@b.com";
const PASSWORD: &str = "Secret123";

fn store(secrets: &[&str]) -> Result<SessionStore> {
    let secrets = secrets
        .iter()
        .map(|secret| SecretString::from((*secret).to_string()))
        .collect();
    Ok(SessionStore::new(SessionConfig::new(
        secrets,
        DeploymentMode::Production,
    )?))
}

fn service_with(users: Arc<dyn UserRepository>) -> Result<AuthService> {
    Ok(AuthService::new(
        store(&["s3cr3t"])?,
        PasswordHasher::new(4)?,
        users,
    )?)
}

fn new_user(email: &str, password: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password: SecretString::from(password.to_string()),
        profile: Profile {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            country: "GB".to_string(),
        },
    }
}

fn credentials(email: &str, password: &str) -> Credentials {
    Credentials {
        email: email.to_string(),
        password: SecretString::from(password.to_string()),
    }
}

/// Turn a `Set-Cookie` value into the `Cookie` header a browser would send.
fn cookie_from(set_cookie: &HeaderValue) -> Result<String> {
    set_cookie
        .to_str()?
        .split(';')
        .next()
        .map(ToString::to_string)
        .context("empty Set-Cookie")
}

/// Repository whose reads can be switched to fail, as if storage went away.
struct FlakyRepository {
    inner: MemoryUserRepository,
    fail_reads: AtomicBool,
    fail_create: bool,
}

impl FlakyRepository {
    fn new(fail_create: bool) -> Self {
        Self {
            inner: MemoryUserRepository::new(),
            fail_reads: AtomicBool::new(false),
            fail_create,
        }
    }
}

impl UserRepository for FlakyRepository {
    fn find_by_email<'a>(&'a self, email: &'a str) -> RepoFuture<'a, Option<UserRecord>> {
        self.inner.find_by_email(email)
    }

    fn find_by_id<'a>(&'a self, id: &'a str) -> RepoFuture<'a, Option<UserRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Box::pin(async { Err(anyhow!("connection reset by peer")) });
        }
        self.inner.find_by_id(id)
    }

    fn count_by_email<'a>(&'a self, email: &'a str) -> RepoFuture<'a, i64> {
        self.inner.count_by_email(email)
    }

    fn create<'a>(&'a self, user: &'a NewUserRecord) -> RepoFuture<'a, UserRecord> {
        if self.fail_create {
            return Box::pin(async { Err(anyhow!("insert failed")) });
        }
        self.inner.create(user)
    }
}

#[test]
fn normalize_email_trims_and_lowercases() {
    assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
}

#[test]
fn login_redirect_target_encodes_path() {
    assert_eq!(
        login_redirect_target("/profile"),
        "/login?redirectTo=%2Fprofile"
    );
    assert_eq!(
        login_redirect_target("/kudos?from=me&page=2"),
        "/login?redirectTo=%2Fkudos%3Ffrom%3Dme%26page%3D2"
    );
}

#[tokio::test]
async fn register_then_login_yields_same_user() -> Result<()> {
    let service = service_with(Arc::new(MemoryUserRepository::new()))?;

    let registered = service.register(new_user(EMAIL, PASSWORD)).await?;
    assert_eq!(registered.redirect_to, "/home");
    let cookie = cookie_from(&registered.set_cookie)?;
    assert_eq!(
        service.require_user_id(Some(&cookie), "/"),
        RequireUser::Authenticated(registered.user_id.clone())
    );

    let logged_in = service.login(credentials(EMAIL, PASSWORD)).await?;
    assert_eq!(logged_in.redirect_to, "/");
    assert_eq!(logged_in.user_id, registered.user_id);

    let cookie = cookie_from(&logged_in.set_cookie)?;
    match service.get_user(Some(&cookie)).await? {
        CurrentUser::Authenticated(user) => {
            assert_eq!(user.id, registered.user_id);
            assert_eq!(user.email, EMAIL);
            assert_eq!(user.profile.first_name, "Ada");
        }
        other => return Err(anyhow!("expected authenticated user, got {other:?}")),
    }
    Ok(())
}

#[tokio::test]
async fn register_stores_a_hash_not_the_password() -> Result<()> {
    let users = Arc::new(MemoryUserRepository::new());
    let service = service_with(users.clone())?;
    service.register(new_user(EMAIL, PASSWORD)).await?;

    let stored = users
        .find_by_email(EMAIL)
        .await?
        .context("user was not stored")?;
    assert_ne!(stored.password_hash, PASSWORD);
    assert!(PasswordHasher::new(4)?.verify(PASSWORD, &stored.password_hash));
    Ok(())
}

#[tokio::test]
async fn login_matches_email_case_insensitively() -> Result<()> {
    let service = service_with(Arc::new(MemoryUserRepository::new()))?;
    service.register(new_user(" A@B.com ", PASSWORD)).await?;

    let issued = service.login(credentials("a@b.COM", PASSWORD)).await?;
    assert!(!issued.user_id.is_empty());
    Ok(())
}

#[tokio::test]
async fn login_failures_are_indistinguishable() -> Result<()> {
    let service = service_with(Arc::new(MemoryUserRepository::new()))?;
    service.register(new_user(EMAIL, PASSWORD)).await?;

    let unknown_email = service
        .login(credentials("nobody@b.com", PASSWORD))
        .await
        .err()
        .context("unknown email logged in")?;
    let wrong_password = service
        .login(credentials(EMAIL, "Secret124"))
        .await
        .err()
        .context("wrong password logged in")?;

    assert!(matches!(unknown_email, AuthError::InvalidCredentials));
    assert!(matches!(wrong_password, AuthError::InvalidCredentials));
    assert_eq!(unknown_email.to_string(), wrong_password.to_string());
    assert_eq!(
        unknown_email.public_message(),
        wrong_password.public_message()
    );
    Ok(())
}

#[tokio::test]
async fn register_rejects_taken_email() -> Result<()> {
    let service = service_with(Arc::new(MemoryUserRepository::new()))?;
    service.register(new_user(EMAIL, PASSWORD)).await?;

    let err = service
        .register(new_user("A@B.COM", "Other123"))
        .await
        .err()
        .context("duplicate registration succeeded")?;
    assert!(matches!(err, AuthError::EmailTaken));
    Ok(())
}

#[tokio::test]
async fn register_creation_failure_echoes_fields_without_password() -> Result<()> {
    let service = service_with(Arc::new(FlakyRepository::new(true)))?;

    let err = service
        .register(new_user(EMAIL, PASSWORD))
        .await
        .err()
        .context("failed creation succeeded")?;
    let AuthError::CreationFailed { fields } = err else {
        return Err(anyhow!("expected CreationFailed, got {err:?}"));
    };
    assert_eq!(fields.email, EMAIL);
    assert_eq!(fields.first_name, "Ada");
    assert_eq!(fields.last_name, "Lovelace");
    assert_eq!(fields.country, "GB");
    assert!(!serde_json::to_string(&fields)?.contains(PASSWORD));
    Ok(())
}

#[tokio::test]
async fn require_user_id_redirects_without_session() -> Result<()> {
    let service = service_with(Arc::new(MemoryUserRepository::new()))?;

    assert_eq!(
        service.require_user_id(None, "/profile"),
        RequireUser::RedirectRequired("/login?redirectTo=%2Fprofile".to_string())
    );
    assert_eq!(
        service.require_user_id(Some("kudos-session=forged.token"), "/profile"),
        RequireUser::RedirectRequired("/login?redirectTo=%2Fprofile".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn logout_then_get_user_is_anonymous() -> Result<()> {
    let service = service_with(Arc::new(MemoryUserRepository::new()))?;
    let issued = service.register(new_user(EMAIL, PASSWORD)).await?;
    let session_cookie = cookie_from(&issued.set_cookie)?;

    let logout = service.logout(Some(&session_cookie))?;
    assert_eq!(logout.redirect_to, "/login");

    let cleared = cookie_from(&logout.set_cookie)?;
    assert!(matches!(
        service.get_user(Some(&cleared)).await?,
        CurrentUser::Anonymous
    ));
    Ok(())
}

#[tokio::test]
async fn logout_without_session_still_clears_cookie() -> Result<()> {
    let service = service_with(Arc::new(MemoryUserRepository::new()))?;
    let logout = service.logout(None)?;
    assert!(logout.set_cookie.to_str()?.contains("Max-Age=0"));
    assert_eq!(logout.redirect_to, "/login");
    Ok(())
}

#[tokio::test]
async fn get_user_without_cookie_is_anonymous() -> Result<()> {
    let service = service_with(Arc::new(MemoryUserRepository::new()))?;
    assert!(matches!(
        service.get_user(None).await?,
        CurrentUser::Anonymous
    ));
    Ok(())
}

#[tokio::test]
async fn get_user_for_deleted_user_is_anonymous() -> Result<()> {
    let service = service_with(Arc::new(MemoryUserRepository::new()))?;
    // Valid signature, but no such user in this repository.
    let cookie = cookie_from(&service.store().create("00000000-0000-0000-0000-000000000000")?)?;
    assert!(matches!(
        service.get_user(Some(&cookie)).await?,
        CurrentUser::Anonymous
    ));
    Ok(())
}

#[tokio::test]
async fn get_user_lookup_fault_forces_logout() -> Result<()> {
    let users = Arc::new(FlakyRepository::new(false));
    let service = service_with(users.clone())?;
    let issued = service.register(new_user(EMAIL, PASSWORD)).await?;
    let cookie = cookie_from(&issued.set_cookie)?;

    users.fail_reads.store(true, Ordering::SeqCst);

    match service.get_user(Some(&cookie)).await? {
        CurrentUser::ForcedLogout(logout) => {
            assert_eq!(logout.redirect_to, "/login");
            assert!(logout.set_cookie.to_str()?.contains("Max-Age=0"));
        }
        other => return Err(anyhow!("expected forced logout, got {other:?}")),
    }
    Ok(())
}

#[tokio::test]
async fn sessions_survive_secret_rotation() -> Result<()> {
    let users: Arc<dyn UserRepository> = Arc::new(MemoryUserRepository::new());
    let before = AuthService::new(store(&["old"])?, PasswordHasher::new(4)?, users.clone())?;
    let issued = before.register(new_user(EMAIL, PASSWORD)).await?;
    let cookie = cookie_from(&issued.set_cookie)?;

    let rotated = AuthService::new(
        store(&["new", "old"])?,
        PasswordHasher::new(4)?,
        users.clone(),
    )?;
    assert_eq!(
        rotated.require_user_id(Some(&cookie), "/"),
        RequireUser::Authenticated(issued.user_id)
    );

    let retired = AuthService::new(store(&["new"])?, PasswordHasher::new(4)?, users)?;
    assert!(matches!(
        retired.require_user_id(Some(&cookie), "/"),
        RequireUser::RedirectRequired(_)
    ));
    Ok(())
}

#[tokio::test]
async fn load_user_resolves_required_session() -> Result<()> {
    let users = Arc::new(FlakyRepository::new(false));
    let service = service_with(users.clone())?;
    let issued = service.register(new_user(EMAIL, PASSWORD)).await?;
    let cookie = cookie_from(&issued.set_cookie)?;

    let RequireUser::Authenticated(user_id) = service.require_user_id(Some(&cookie), "/me") else {
        return Err(anyhow!("expected an authenticated session"));
    };
    match service.load_user(&user_id, Some(&cookie)).await? {
        CurrentUser::Authenticated(user) => assert_eq!(user.email, EMAIL),
        other => return Err(anyhow!("expected the registered user, got {other:?}")),
    }

    users.fail_reads.store(true, Ordering::SeqCst);
    assert!(matches!(
        service.load_user(&user_id, Some(&cookie)).await?,
        CurrentUser::ForcedLogout(_)
    ));
    Ok(())
}
