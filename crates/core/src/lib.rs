//! `sessiongate-core`: shared building blocks for the session/authorization core.
//!
//! This crate contains **pure** primitives (no IO, no HTTP, no storage).

pub mod clock;
pub mod error;
pub mod id;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{DomainError, DomainResult};
pub use id::UserId;
