use crate::{
    api,
    auth::{
        AuthService, DeploymentMode, MemoryUserRepository, PasswordHasher, PgUserRepository,
        SameSite, SessionConfig, SessionStore, UserRepository,
    },
};
use anyhow::Result;
use secrecy::SecretString;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub environment: DeploymentMode,
    pub session_secrets: Vec<SecretString>,
    pub session_cookie_name: String,
    pub session_max_age_seconds: i64,
    pub session_same_site: SameSite,
    pub bcrypt_cost: u32,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the session configuration is invalid, the database is
/// unreachable, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let store = SessionStore::new(session_config(&args)?);
    debug!("Session cookie: {:?}", store.config());

    let hasher = PasswordHasher::new(args.bcrypt_cost)?;

    let (users, pool): (Arc<dyn UserRepository>, Option<PgPool>) = match args.dsn.as_deref() {
        Some(dsn) => {
            let pool = api::connect(dsn).await?;
            info!("Connected to database");
            (Arc::new(PgUserRepository::new(pool.clone())), Some(pool))
        }
        None => {
            warn!("No database configured; users are kept in memory and lost on restart");
            (Arc::new(MemoryUserRepository::new()), None)
        }
    };

    let auth = Arc::new(AuthService::new(store, hasher, users)?);

    info!("Environment: {}", args.environment.as_str());

    api::new(args.port, auth, pool).await
}

fn session_config(args: &Args) -> Result<SessionConfig> {
    Ok(
        SessionConfig::new(args.session_secrets.clone(), args.environment)?
            .with_name(args.session_cookie_name.clone())?
            .with_max_age_seconds(args.session_max_age_seconds)
            .with_same_site(args.session_same_site),
    )
}
