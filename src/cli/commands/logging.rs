use clap::{builder::ValueParser, Arg, ArgAction, Command};

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_JSON: &str = "log-json";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("SSO_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_LOG_JSON)
                .long(ARG_LOG_JSON)
                .help("Emit logs as JSON lines")
                .env("SSO_LOG_JSON")
                .global(true)
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validator_log_level() {
        let command = Command::new("test").arg(
            Arg::new("level")
                .long("level")
                .value_parser(validator_log_level()),
        );

        for (value, expected) in [("error", 0u8), ("WARN", 1), ("info", 2), ("5", 5)] {
            let matches = command
                .clone()
                .try_get_matches_from(["test", "--level", value])
                .unwrap();
            assert_eq!(matches.get_one::<u8>("level").copied(), Some(expected));
        }

        assert!(command
            .clone()
            .try_get_matches_from(["test", "--level", "loud"])
            .is_err());
        assert!(command
            .try_get_matches_from(["test", "--level", "6"])
            .is_err());
    }
}
