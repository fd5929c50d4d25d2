//! Map validated CLI arguments to the action the binary executes.

use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use secrecy::SecretString;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;
    let frontend_origin = matches.get_one::<String>("frontend-origin").cloned();

    Ok(Action::Server(Args {
        port,
        dsn: SecretString::from(dsn),
        frontend_origin,
    }))
}
