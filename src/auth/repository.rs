//! User repository collaborator and its PostgreSQL implementation.

use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::{collections::HashMap, future::Future, pin::Pin};
use tokio::sync::Mutex;
use tracing::Instrument;
use utoipa::ToSchema;
use uuid::Uuid;

pub type RepoFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub country: String,
}

/// A stored user. `password_hash` never leaves the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub profile: Profile,
}

/// Registration input as submitted by the form.
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password: SecretString,
    pub profile: Profile,
}

impl NewUser {
    /// Submitted values safe to echo back, without the password.
    #[must_use]
    pub fn fields(&self) -> RegistrationFields {
        RegistrationFields {
            email: self.email.clone(),
            first_name: self.profile.first_name.clone(),
            last_name: self.profile.last_name.clone(),
            country: self.profile.country.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationFields {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub country: String,
}

/// What the repository persists for a new account.
#[derive(Clone, Debug)]
pub struct NewUserRecord {
    pub email: String,
    pub password_hash: String,
    pub profile: Profile,
}

pub trait UserRepository: Send + Sync {
    fn find_by_email<'a>(&'a self, email: &'a str) -> RepoFuture<'a, Option<UserRecord>>;
    fn find_by_id<'a>(&'a self, id: &'a str) -> RepoFuture<'a, Option<UserRecord>>;
    fn count_by_email<'a>(&'a self, email: &'a str) -> RepoFuture<'a, i64>;
    fn create<'a>(&'a self, user: &'a NewUserRecord) -> RepoFuture<'a, UserRecord>;
}

#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

const SELECT_USER: &str =
    "SELECT id::text AS id, email, password_hash, first_name, last_name, country FROM users";

fn db_span(operation: &'static str, statement: &str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn user_from_row(row: &PgRow) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        profile: Profile {
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            country: row.get("country"),
        },
    }
}

impl UserRepository for PgUserRepository {
    fn find_by_email<'a>(&'a self, email: &'a str) -> RepoFuture<'a, Option<UserRecord>> {
        Box::pin(async move {
            let query = format!("{SELECT_USER} WHERE email = $1");
            let span = db_span("SELECT", &query);
            let row = sqlx::query(&query)
                .bind(email)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .context("failed to lookup user by email")?;
            Ok(row.as_ref().map(user_from_row))
        })
    }

    fn find_by_id<'a>(&'a self, id: &'a str) -> RepoFuture<'a, Option<UserRecord>> {
        Box::pin(async move {
            // Ids are minted here, so anything else cannot name a user.
            let Ok(id) = Uuid::parse_str(id) else {
                return Ok(None);
            };
            let query = format!("{SELECT_USER} WHERE id = $1");
            let span = db_span("SELECT", &query);
            let row = sqlx::query(&query)
                .bind(id)
                .fetch_optional(&self.pool)
                .instrument(span)
                .await
                .context("failed to lookup user by id")?;
            Ok(row.as_ref().map(user_from_row))
        })
    }

    fn count_by_email<'a>(&'a self, email: &'a str) -> RepoFuture<'a, i64> {
        Box::pin(async move {
            let query = "SELECT COUNT(*) AS count FROM users WHERE email = $1";
            let span = db_span("SELECT", query);
            let row = sqlx::query(query)
                .bind(email)
                .fetch_one(&self.pool)
                .instrument(span)
                .await
                .context("failed to count users by email")?;
            Ok(row.get("count"))
        })
    }

    fn create<'a>(&'a self, user: &'a NewUserRecord) -> RepoFuture<'a, UserRecord> {
        Box::pin(async move {
            let query = r"
                INSERT INTO users
                    (email, password_hash, first_name, last_name, country)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id::text AS id, email, password_hash, first_name, last_name, country
            ";
            let span = db_span("INSERT", query);
            let row = sqlx::query(query)
                .bind(&user.email)
                .bind(&user.password_hash)
                .bind(&user.profile.first_name)
                .bind(&user.profile.last_name)
                .bind(&user.profile.country)
                .fetch_one(&self.pool)
                .instrument(span)
                .await
                .context("failed to insert user")?;
            Ok(user_from_row(&row))
        })
    }
}

/// Process-local repository for development runs without a database.
/// Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryUserRepository {
    users: Mutex<HashMap<String, UserRecord>>,
}

impl MemoryUserRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserRepository for MemoryUserRepository {
    fn find_by_email<'a>(&'a self, email: &'a str) -> RepoFuture<'a, Option<UserRecord>> {
        Box::pin(async move {
            let users = self.users.lock().await;
            Ok(users.values().find(|user| user.email == email).cloned())
        })
    }

    fn find_by_id<'a>(&'a self, id: &'a str) -> RepoFuture<'a, Option<UserRecord>> {
        Box::pin(async move { Ok(self.users.lock().await.get(id).cloned()) })
    }

    fn count_by_email<'a>(&'a self, email: &'a str) -> RepoFuture<'a, i64> {
        Box::pin(async move {
            let users = self.users.lock().await;
            let count = users.values().filter(|user| user.email == email).count();
            Ok(i64::try_from(count)?)
        })
    }

    fn create<'a>(&'a self, user: &'a NewUserRecord) -> RepoFuture<'a, UserRecord> {
        Box::pin(async move {
            let mut users = self.users.lock().await;
            // Same guarantee as the unique index on users.email.
            if users.values().any(|existing| existing.email == user.email) {
                return Err(anyhow!("duplicate email"));
            }
            let record = UserRecord {
                id: Uuid::new_v4().to_string(),
                email: user.email.clone(),
                password_hash: user.password_hash.clone(),
                profile: user.profile.clone(),
            };
            users.insert(record.id.clone(), record.clone());
            Ok(record)
        })
    }
}
