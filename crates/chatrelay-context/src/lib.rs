//! Chatrelay Context Management - per-channel conversation windows
//!
//! This crate provides:
//! - Channel contexts with lazy expiry and bounded length
//! - The respond flow that feeds a completion provider
//! - Reply sanitizing for line-oriented chat transports

pub mod clock;
pub mod context;
pub mod error;
pub mod manager;
pub mod sanitize;
pub mod window;

pub use clock::{Clock, SystemClock};
pub use context::{ChannelContext, Turn};
pub use error::{ContextError, ContextResult};
pub use manager::ContextManager;
pub use sanitize::sanitize;
pub use window::{ContextWindow, TrimStrategy};

/// Prelude for common imports
pub mod prelude {
    pub use crate::context::{ChannelContext, Turn};
    pub use crate::error::{ContextError, ContextResult};
    pub use crate::manager::ContextManager;
    pub use crate::sanitize::sanitize;
    pub use crate::window::{ContextWindow, TrimStrategy};
}
