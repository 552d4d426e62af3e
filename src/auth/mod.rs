//! Authentication and authorization for AIVerse
//!
//! Provides:
//! - Identity token verification (JWT issued by the identity provider)
//! - Plans and per-operation access policies

pub mod jwt;
pub mod policy;

pub use jwt::{extract_token_from_header, Claims, JwtValidator, TokenValidationResult};
pub use policy::{check_access, AccessPolicy, Denial, Plan};
