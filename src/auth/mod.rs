//! Authentication core: password hashing, session tokens and the service that
//! ties them to the user store.

mod context;
mod error;
mod hasher;
mod service;
pub mod token;


pub use context::CallContext;
pub use error::{AuthError, Rejection};
pub use hasher::{Argon2Hasher, CredentialHasher, HashError};
pub use service::AuthService;
pub use token::{Claims, TokenConfig, TokenError, TokenIssuer};
