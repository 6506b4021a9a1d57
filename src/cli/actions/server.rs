use crate::{
    api::{self, ApiState},
    auth::{Argon2Hasher, AuthService, TokenConfig, TokenIssuer},
    cli::telemetry,
    storage::{AppStore, PgStore, UserStore},
};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use std::{sync::Arc, time::Duration};
use tracing::debug;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub request_timeout_seconds: u64,
    pub token_secret: SecretString,
    pub token_ttl_seconds: u64,
    pub token_leeway_seconds: u64,
    pub hash_memory_kib: u32,
    pub hash_iterations: u32,
    pub hash_parallelism: u32,
}

/// Build the auth service from `args`.
///
/// # Errors
/// Returns an error if the hashing costs are out of range.
pub fn build_service<S>(args: &Args, store: Arc<S>) -> Result<AuthService>
where
    S: UserStore + AppStore + 'static,
{
    let hasher = Argon2Hasher::with_costs(
        args.hash_memory_kib,
        args.hash_iterations,
        args.hash_parallelism,
    )
    .context("Invalid password hashing parameters")?;

    let tokens = TokenIssuer::new(
        TokenConfig::new(
            args.token_secret.expose_secret().as_bytes(),
            Duration::from_secs(args.token_ttl_seconds),
        )
        .with_leeway(Duration::from_secs(args.token_leeway_seconds)),
    );

    Ok(AuthService::new(
        store.clone(),
        store,
        Arc::new(hasher),
        tokens,
    ))
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let store = Arc::new(PgStore::connect(&args.dsn).await?);

    let auth = build_service(&args, store)?;
    debug!("auth service: {:?}", auth);

    let state = ApiState::new(
        Arc::new(auth),
        Duration::from_secs(args.request_timeout_seconds),
    );

    let result = api::serve(args.port, state).await;

    telemetry::shutdown_tracer();

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::CallContext,
        storage::MemoryStore,
    };

    fn args() -> Args {
        Args {
            port: 8080,
            dsn: "postgres://localhost/sso".to_string(),
            request_timeout_seconds: 5,
            token_secret: SecretString::from("s3cret".to_string()),
            token_ttl_seconds: 60,
            token_leeway_seconds: 2,
            hash_memory_kib: 8,
            hash_iterations: 1,
            hash_parallelism: 1,
        }
    }

    #[tokio::test]
    async fn built_service_round_trips_a_login() {
        let service = build_service(&args(), Arc::new(MemoryStore::new())).unwrap();
        assert_eq!(service.tokens().config().ttl(), Duration::from_secs(60));
        assert_eq!(service.tokens().config().leeway(), Duration::from_secs(2));

        let ctx = CallContext::new();
        let id = service.register(&ctx, "a@x.com", "password1").await.unwrap();
        let token = service
            .login(&ctx, "a@x.com", "password1", None)
            .await
            .unwrap();
        assert_eq!(service.validate_token(&ctx, &token).await.unwrap(), id);
    }

    #[test]
    fn invalid_hash_costs_are_rejected() {
        let mut args = args();
        args.hash_memory_kib = 1;
        assert!(build_service(&args, Arc::new(MemoryStore::new())).is_err());
    }

    #[test]
    fn args_debug_redacts_secret() {
        assert!(!format!("{:?}", args()).contains("s3cret"));
    }
}
