//! Completion provider implementations
//!
//! Concrete implementations of the `CompletionProvider` trait for remote
//! text-generation services.

pub mod anthropic;

pub use anthropic::AnthropicProvider;
