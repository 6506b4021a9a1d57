use clap::{Arg, ArgMatches, Command};

pub const ARG_HASH_MEMORY_KIB: &str = "hash-memory-kib";
pub const ARG_HASH_ITERATIONS: &str = "hash-iterations";
pub const ARG_HASH_PARALLELISM: &str = "hash-parallelism";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let get = |id: &str, default: u32| matches.get_one::<u32>(id).copied().unwrap_or(default);

        Self {
            memory_kib: get(ARG_HASH_MEMORY_KIB, argon2::Params::DEFAULT_M_COST),
            iterations: get(ARG_HASH_ITERATIONS, argon2::Params::DEFAULT_T_COST),
            parallelism: get(ARG_HASH_PARALLELISM, argon2::Params::DEFAULT_P_COST),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_HASH_MEMORY_KIB)
                .long(ARG_HASH_MEMORY_KIB)
                .help("Argon2 memory cost in KiB")
                .env("SSO_HASH_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32).range(8..)),
        )
        .arg(
            Arg::new(ARG_HASH_ITERATIONS)
                .long(ARG_HASH_ITERATIONS)
                .help("Argon2 iterations")
                .env("SSO_HASH_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_HASH_PARALLELISM)
                .long(ARG_HASH_PARALLELISM)
                .help("Argon2 lanes")
                .env("SSO_HASH_PARALLELISM")
                .default_value("1")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
}
