use anyhow::bail;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_TOKEN_SECRET: &str = "token-secret";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_TOKEN_LEEWAY_SECONDS: &str = "token-leeway-seconds";

#[derive(Debug)]
pub struct Options {
    pub secret: SecretString,
    pub ttl_seconds: u64,
    pub leeway_seconds: u64,
}

impl Options {
    /// Parse token arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let secret = match matches.get_one::<String>(ARG_TOKEN_SECRET) {
            Some(value) if !value.trim().is_empty() => SecretString::from(value.clone()),
            _ => bail!("missing required argument: --{ARG_TOKEN_SECRET}"),
        };

        Ok(Self {
            secret,
            ttl_seconds: matches
                .get_one::<u64>(ARG_TOKEN_TTL_SECONDS)
                .copied()
                .unwrap_or(3600),
            leeway_seconds: matches
                .get_one::<u64>(ARG_TOKEN_LEEWAY_SECONDS)
                .copied()
                .unwrap_or(0),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_SECRET)
                .long(ARG_TOKEN_SECRET)
                .help("HMAC secret used to sign session tokens")
                .long_help(
                    "HMAC secret used to sign and verify session tokens. Rotating it invalidates every outstanding token.",
                )
                .env("SSO_TOKEN_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Session token lifetime in seconds")
                .env("SSO_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_TOKEN_LEEWAY_SECONDS)
                .long(ARG_TOKEN_LEEWAY_SECONDS)
                .help("Accept tokens this many seconds past expiry (clock skew)")
                .env("SSO_TOKEN_LEEWAY_SECONDS")
                .default_value("0")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("test"))
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("SSO_TOKEN_SECRET", None::<&str>),
                ("SSO_TOKEN_TTL_SECONDS", None),
                ("SSO_TOKEN_LEEWAY_SECONDS", None),
            ],
            || {
                let matches = command().get_matches_from(["test", "--token-secret", "s3cret"]);
                let options = Options::parse(&matches).unwrap();
                assert_eq!(options.secret.expose_secret(), "s3cret");
                assert_eq!(options.ttl_seconds, 3600);
                assert_eq!(options.leeway_seconds, 0);
            },
        );
    }

    #[test]
    fn test_env() {
        temp_env::with_vars(
            [
                ("SSO_TOKEN_SECRET", Some("from-env")),
                ("SSO_TOKEN_TTL_SECONDS", Some("60")),
                ("SSO_TOKEN_LEEWAY_SECONDS", Some("5")),
            ],
            || {
                let matches = command().get_matches_from(["test"]);
                let options = Options::parse(&matches).unwrap();
                assert_eq!(options.secret.expose_secret(), "from-env");
                assert_eq!(options.ttl_seconds, 60);
                assert_eq!(options.leeway_seconds, 5);
            },
        );
    }

    #[test]
    fn test_zero_ttl_rejected() {
        temp_env::with_vars([("SSO_TOKEN_TTL_SECONDS", None::<&str>)], || {
            let result = command().try_get_matches_from([
                "test",
                "--token-secret",
                "s3cret",
                "--token-ttl-seconds",
                "0",
            ]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn test_blank_secret_rejected() {
        temp_env::with_vars([("SSO_TOKEN_SECRET", None::<&str>)], || {
            let matches = command().get_matches_from(["test", "--token-secret", "  "]);
            let err = Options::parse(&matches).unwrap_err();
            assert!(err
                .to_string()
                .contains("missing required argument: --token-secret"));
        });
    }

    #[test]
    fn test_debug_redacts_secret() {
        temp_env::with_vars([("SSO_TOKEN_SECRET", None::<&str>)], || {
            let matches = command().get_matches_from(["test", "--token-secret", "s3cret"]);
            let options = Options::parse(&matches).unwrap();
            assert!(!format!("{options:?}").contains("s3cret"));
        });
    }
}
