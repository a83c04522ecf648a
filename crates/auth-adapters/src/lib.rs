//! Token verification adapters implementing [`domains::TokenVerifier`].

#[cfg(feature = "auth-jwt")]
pub mod jwt;

#[cfg(feature = "auth-jwt")]
pub use jwt::JwtVerifier;
