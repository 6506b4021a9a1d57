//! Map parsed arguments to the action the binary runs.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{hash, token, ARG_DSN, ARG_PORT, ARG_REQUEST_TIMEOUT_SECONDS};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or blank.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|dsn| !dsn.trim().is_empty())
        .context("missing required argument: --dsn")?;
    let request_timeout_seconds = matches
        .get_one::<u64>(ARG_REQUEST_TIMEOUT_SECONDS)
        .copied()
        .unwrap_or(5);

    let token_opts = token::Options::parse(matches)?;
    let hash_opts = hash::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        dsn,
        request_timeout_seconds,
        token_secret: token_opts.secret,
        token_ttl_seconds: token_opts.ttl_seconds,
        token_leeway_seconds: token_opts.leeway_seconds,
        hash_memory_kib: hash_opts.memory_kib,
        hash_iterations: hash_opts.iterations,
        hash_parallelism: hash_opts.parallelism,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn server_action_from_env() {
        temp_env::with_vars(
            [
                ("SSO_PORT", Some("9000")),
                ("SSO_DSN", Some("postgres://user@localhost:5432/sso")),
                ("SSO_TOKEN_SECRET", Some("s3cret")),
                ("SSO_TOKEN_TTL_SECONDS", Some("120")),
                ("SSO_TOKEN_LEEWAY_SECONDS", None),
                ("SSO_REQUEST_TIMEOUT_SECONDS", None),
                ("SSO_HASH_ITERATIONS", Some("3")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["sso"]);
                let Ok(Action::Server(args)) = handler(&matches) else {
                    panic!("expected server action");
                };
                assert_eq!(args.port, 9000);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/sso");
                assert_eq!(args.token_secret.expose_secret(), "s3cret");
                assert_eq!(args.token_ttl_seconds, 120);
                assert_eq!(args.token_leeway_seconds, 0);
                assert_eq!(args.request_timeout_seconds, 5);
                assert_eq!(args.hash_iterations, 3);
            },
        );
    }

    #[test]
    fn blank_token_secret_is_rejected() {
        temp_env::with_vars(
            [
                ("SSO_DSN", Some("postgres://user@localhost:5432/sso")),
                ("SSO_TOKEN_SECRET", Some(" ")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["sso"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err
                        .to_string()
                        .contains("missing required argument: --token-secret"));
                }
            },
        );
    }
}
