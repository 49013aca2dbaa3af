//! Platform client implementations for Argon.
//!
//! This crate provides concrete implementations of the `PlatformClient` trait.
//!
//! # Clients
//!
//! - **Http**: JSON target protocol over `reqwest`
//! - **Mock**: In-memory backend for tests and dry runs

pub mod http;
pub mod mock;

pub use http::HttpPlatformClient;
pub use mock::{MockPlatform, RecordedCall};
