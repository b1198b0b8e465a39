//! Shared types for the roomfeed live Q&A client.
//!
//! Wire models, the subscription event schema and the error types that cross
//! crate boundaries.

pub mod error;
pub mod models;
pub mod protocol;

pub use error::*;
pub use models::*;
pub use protocol::*;
