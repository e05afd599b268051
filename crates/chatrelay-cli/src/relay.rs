//! Glue between IRC events and the context manager

use std::sync::Arc;

use chatrelay_context::{sanitize, ContextManager};
use chatrelay_irc::{IrcEvent, IrcResult, IrcSender};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const NICKSERV: &str = "NickServ";
const IDENTIFIED_NOTICE: &str = "You are now identified";

/// Returns the message body when `text` starts with `<nick>:`.
pub fn addressed_text<'a>(text: &'a str, nick: &str) -> Option<&'a str> {
    text.strip_prefix(nick)?.strip_prefix(':').map(str::trim)
}

/// Where a reply goes: the channel for channel messages, the sender for
/// direct messages.
pub fn reply_target<'a>(target: &'a str, sender: &'a str) -> &'a str {
    if target.starts_with(['#', '&', '+', '!']) {
        target
    } else {
        sender
    }
}

pub struct Relay {
    manager: Arc<ContextManager>,
    sender: IrcSender,
    nick: String,
    nickserv_password: Option<String>,
    channels: Vec<String>,
}

impl Relay {
    pub fn new(
        manager: Arc<ContextManager>,
        sender: IrcSender,
        nick: impl Into<String>,
        nickserv_password: Option<String>,
        channels: Vec<String>,
    ) -> Self {
        Self {
            manager,
            sender,
            nick: nick.into(),
            nickserv_password,
            channels,
        }
    }

    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Consumes events until the connection reports `Disconnected`.
    pub async fn run(mut self, mut events: mpsc::Receiver<IrcEvent>) -> IrcResult<()> {
        while let Some(event) = events.recv().await {
            if matches!(event, IrcEvent::Disconnected) {
                info!("disconnected, stopping relay");
                break;
            }
            self.handle(event).await?;
        }
        Ok(())
    }

    /// Handles one event. Addressed messages are answered on a spawned task,
    /// whose handle is returned.
    pub async fn handle(&mut self, event: IrcEvent) -> IrcResult<Option<JoinHandle<()>>> {
        match event {
            IrcEvent::Registered { nick } => {
                self.nick = nick;
                if let Some(password) = &self.nickserv_password {
                    info!("registered, identifying to NickServ");
                    self.sender
                        .privmsg(NICKSERV, &format!("IDENTIFY {password}"))
                        .await?;
                } else {
                    self.join_channels().await?;
                }
            }
            IrcEvent::NickChanged { nick } => {
                info!(%nick, "nick changed");
                self.nick = nick;
            }
            IrcEvent::Notice { nick, text } if nick == NICKSERV => {
                info!(notice = %text, "NickServ");
                if text.contains(IDENTIFIED_NOTICE) {
                    info!("identified, joining channels");
                    self.join_channels().await?;
                }
            }
            IrcEvent::Notice { .. } | IrcEvent::Disconnected => {}
            IrcEvent::Privmsg { target, nick, text } => {
                info!(%target, from = %nick, %text, "PRIVMSG");
                return Ok(self.dispatch(&target, &nick, &text));
            }
        }
        Ok(None)
    }

    fn dispatch(&self, target: &str, from: &str, text: &str) -> Option<JoinHandle<()>> {
        let prompt = addressed_text(text, &self.nick)?.to_string();
        let channel = reply_target(target, from).to_string();
        let manager = Arc::clone(&self.manager);
        let sender = self.sender.clone();
        let nick = self.nick.clone();

        debug!(%channel, "forwarding addressed message");
        Some(tokio::spawn(async move {
            let reply = match manager.respond(&channel, &prompt).await {
                Ok(reply) => reply,
                Err(err) => {
                    warn!(%channel, error = %err, "responding failed");
                    sanitize(
                        &format!("{nick} had a brainfart: {err}"),
                        manager.window().max_reply_chars,
                    )
                }
            };
            if reply.is_empty() {
                warn!(%channel, "empty reply, nothing to send");
                return;
            }
            if let Err(err) = sender.privmsg(&channel, &reply).await {
                warn!(%channel, error = %err, "failed to send reply");
            }
        }))
    }

    async fn join_channels(&self) -> IrcResult<()> {
        for channel in &self.channels {
            info!(%channel, "joining");
            self.sender.join(channel).await?;
        }
        Ok(())
    }
}
