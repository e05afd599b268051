//! Chatrelay IRC transport
//!
//! Connects to an IRC server (TLS or plain TCP), registers a nick and turns
//! the server's lines into [`IrcEvent`]s. Outgoing traffic goes through a
//! clonable [`IrcSender`].

pub mod client;
pub mod error;
pub mod message;

pub use client::{IrcClient, IrcConfig, IrcEvent, IrcSender, IrcSession};
pub use error::{IrcError, IrcResult};
pub use message::IrcMessage;
