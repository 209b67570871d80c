//! Image censorship provider integration
//!
//! [`TokenCache`] keeps the OAuth bearer token on disk; [`ModerationClient`] submits
//! images and turns the provider payload into a [`tuku_core::ModerationVerdict`].

mod client;
mod response;
mod token_cache;

pub use client::ModerationClient;
pub use token_cache::TokenCache;
