//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to an action, such as starting the server with
//! its session and database configuration.

use crate::auth::DeploymentMode;
use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_DSN, ARG_PORT, session};
use anyhow::{Result, bail};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches.get_one::<String>(ARG_DSN).cloned();

    let session_opts = session::Options::parse(matches)?;

    if dsn.is_none() && session_opts.environment == DeploymentMode::Production {
        bail!("missing required argument: --dsn");
    }

    Ok(Action::Server(Args {
        port,
        dsn,
        environment: session_opts.environment,
        session_secrets: session_opts.secrets,
        session_cookie_name: session_opts.cookie_name,
        session_max_age_seconds: session_opts.max_age_seconds,
        session_same_site: session_opts.same_site,
        bcrypt_cost: session_opts.bcrypt_cost,
    }))
}
