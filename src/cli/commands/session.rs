use crate::auth::{
    DEFAULT_BCRYPT_COST, DEFAULT_SESSION_COOKIE_NAME, DEFAULT_SESSION_MAX_AGE_SECONDS,
    DeploymentMode, SameSite,
};
use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, builder::ValueParser};
use secrecy::SecretString;

pub const ARG_SESSION_SECRET: &str = "session-secret";
pub const ARG_SESSION_COOKIE_NAME: &str = "session-cookie-name";
pub const ARG_SESSION_MAX_AGE_SECONDS: &str = "session-max-age-seconds";
pub const ARG_SESSION_SAME_SITE: &str = "session-same-site";
pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_BCRYPT_COST: &str = "bcrypt-cost";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SESSION_SECRET)
                .long("session-secret")
                .help("Session signing secret; repeat or comma-separate to rotate, newest first")
                .env("KUDOS_SESSION_SECRET")
                .hide_env_values(true)
                .action(ArgAction::Append)
                .value_delimiter(',')
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_COOKIE_NAME)
                .long("session-cookie-name")
                .help("Name of the session cookie")
                .env("KUDOS_SESSION_COOKIE_NAME")
                .default_value(DEFAULT_SESSION_COOKIE_NAME),
        )
        .arg(
            Arg::new(ARG_SESSION_MAX_AGE_SECONDS)
                .long("session-max-age-seconds")
                .help("Session lifetime in seconds")
                .env("KUDOS_SESSION_MAX_AGE_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_SESSION_SAME_SITE)
                .long("session-same-site")
                .help("SameSite attribute of the session cookie: lax, strict, none")
                .env("KUDOS_SESSION_SAME_SITE")
                .default_value("lax")
                .value_parser(ValueParser::from(|value: &str| value.parse::<SameSite>())),
        )
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long("environment")
                .help("Deployment environment: production, development (cookies are only sent over HTTPS in production)")
                .env("KUDOS_ENVIRONMENT")
                .default_value("production")
                .value_parser(ValueParser::from(|value: &str| {
                    value.parse::<DeploymentMode>()
                })),
        )
        .arg(
            Arg::new(ARG_BCRYPT_COST)
                .long("bcrypt-cost")
                .help("bcrypt cost factor for new password hashes")
                .env("KUDOS_BCRYPT_COST")
                .default_value("10")
                .value_parser(clap::value_parser!(u32).range(4..=31)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub secrets: Vec<SecretString>,
    pub cookie_name: String,
    pub max_age_seconds: i64,
    pub same_site: SameSite,
    pub environment: DeploymentMode,
    pub bcrypt_cost: u32,
}

impl Options {
    /// # Errors
    /// Returns an error if a required session argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secrets = matches
            .get_many::<String>(ARG_SESSION_SECRET)
            .context("missing required argument: --session-secret")?
            .map(|secret| SecretString::from(secret.clone()))
            .collect();

        Ok(Self {
            secrets,
            cookie_name: matches
                .get_one::<String>(ARG_SESSION_COOKIE_NAME)
                .cloned()
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE_NAME.to_string()),
            max_age_seconds: matches
                .get_one::<i64>(ARG_SESSION_MAX_AGE_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_SESSION_MAX_AGE_SECONDS),
            same_site: matches
                .get_one::<SameSite>(ARG_SESSION_SAME_SITE)
                .copied()
                .unwrap_or(SameSite::Lax),
            environment: matches
                .get_one::<DeploymentMode>(ARG_ENVIRONMENT)
                .copied()
                .unwrap_or(DeploymentMode::Production),
            bcrypt_cost: matches
                .get_one::<u32>(ARG_BCRYPT_COST)
                .copied()
                .unwrap_or(DEFAULT_BCRYPT_COST),
        })
    }
}
