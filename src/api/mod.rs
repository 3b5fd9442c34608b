//! REST backend access.

mod client;
mod envelope;
mod error;
pub mod types;

pub use client::{ApiClient, ResourceService};
pub use error::ApiError;
