//! IRC connection, registration and event loop

use std::sync::Arc;

use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, trace, warn};

use crate::error::{IrcError, IrcResult};
use crate::message::IrcMessage;

const OUTGOING_BUFFER: usize = 64;
const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct IrcConfig {
    pub server: String,
    pub port: u16,
    pub nick: String,
    /// Sent as `PASS` before registration; unrelated to NickServ.
    pub server_password: Option<String>,
    pub tls: bool,
}

/// What the relay sees of the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrcEvent {
    /// Server accepted registration under `nick`.
    Registered { nick: String },
    /// Our own nick changed after registration.
    NickChanged { nick: String },
    Privmsg {
        target: String,
        nick: String,
        text: String,
    },
    Notice { nick: String, text: String },
    Disconnected,
}

/// Clonable handle for writing to the connection.
#[derive(Debug, Clone)]
pub struct IrcSender {
    tx: mpsc::Sender<IrcMessage>,
}

impl IrcSender {
    pub fn new(tx: mpsc::Sender<IrcMessage>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, message: IrcMessage) -> IrcResult<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| IrcError::ConnectionClosed)
    }

    pub async fn privmsg(&self, target: &str, text: &str) -> IrcResult<()> {
        self.send(IrcMessage::privmsg(target, text)).await
    }

    pub async fn join(&self, channel: &str) -> IrcResult<()> {
        self.send(IrcMessage::join(channel)).await
    }
}

/// A registered-or-registering connection.
#[derive(Debug)]
pub struct IrcSession {
    pub sender: IrcSender,
    pub events: mpsc::Receiver<IrcEvent>,
    /// Reader task; finishes when the server closes the connection.
    pub task: JoinHandle<IrcResult<()>>,
}

#[derive(Debug, Clone)]
pub struct IrcClient {
    config: IrcConfig,
}

impl IrcClient {
    pub fn new(config: IrcConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IrcConfig {
        &self.config
    }

    /// Opens the TCP (and, if configured, TLS) connection and starts registration.
    pub async fn connect(self) -> IrcResult<IrcSession> {
        let addr = format!("{}:{}", self.config.server, self.config.port);
        info!(%addr, tls = self.config.tls, "connecting to IRC server");

        let tcp = TcpStream::connect(&addr).await?;
        if self.config.tls {
            let stream = tls_connect(&self.config.server, tcp).await?;
            self.start(stream).await
        } else {
            self.start(tcp).await
        }
    }

    /// Runs the session over an already established stream.
    pub async fn start<S>(self, stream: S) -> IrcResult<IrcSession>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (out_tx, out_rx) = mpsc::channel(OUTGOING_BUFFER);
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            if let Err(err) = write_loop(writer, out_rx).await {
                warn!(error = %err, "IRC writer stopped");
            }
        });

        let sender = IrcSender::new(out_tx);
        if let Some(password) = &self.config.server_password {
            sender.send(IrcMessage::pass(password)).await?;
        }
        sender.send(IrcMessage::nick(&self.config.nick)).await?;
        sender
            .send(IrcMessage::user(&self.config.nick, &self.config.nick))
            .await?;

        let task = tokio::spawn(read_loop(
            BufReader::new(reader),
            sender.clone(),
            event_tx,
            self.config.nick,
        ));

        Ok(IrcSession {
            sender,
            events: event_rx,
            task,
        })
    }
}

async fn tls_connect(server: &str, tcp: TcpStream) -> IrcResult<TlsStream<TcpStream>> {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .map_err(|e| IrcError::Tls(e.to_string()))?
            .with_root_certificates(roots)
            .with_no_client_auth();

    let name = ServerName::try_from(server.to_string())
        .map_err(|_| IrcError::InvalidServerName(server.to_string()))?;

    TlsConnector::from(Arc::new(config))
        .connect(name, tcp)
        .await
        .map_err(|e| IrcError::Tls(e.to_string()))
}

async fn write_loop<W>(mut writer: W, mut outgoing: mpsc::Receiver<IrcMessage>) -> IrcResult<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(message) = outgoing.recv().await {
        trace!(command = %message.command, "irc >>");
        writer.write_all(format!("{message}\r\n").as_bytes()).await?;
        writer.flush().await?;
    }
    writer.shutdown().await?;
    Ok(())
}

async fn read_loop<R>(
    mut reader: R,
    sender: IrcSender,
    events: mpsc::Sender<IrcEvent>,
    mut nick: String,
) -> IrcResult<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::with_capacity(512);
    let mut registered = false;

    let result = loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break Ok(()),
            Ok(_) => {}
            Err(err) => break Err(IrcError::from(err)),
        }
        // Clients send whatever encoding they like; never drop the session over it.
        let line = String::from_utf8_lossy(&buf);
        let Some(message) = IrcMessage::parse(&line) else {
            continue;
        };
        trace!(command = %message.command, "irc <<");

        let event = match message.command.as_str() {
            "PING" => {
                let token = message.trailing().unwrap_or_default();
                if let Err(err) = sender.send(IrcMessage::pong(token)).await {
                    break Err(err);
                }
                None
            }
            "001" => {
                registered = true;
                if let Some(assigned) = message.param(0) {
                    nick = assigned.to_string();
                }
                info!(%nick, "registered with IRC server");
                Some(IrcEvent::Registered { nick: nick.clone() })
            }
            "433" if !registered => {
                nick.push('_');
                debug!(%nick, "nick in use, retrying");
                if let Err(err) = sender.send(IrcMessage::nick(&nick)).await {
                    break Err(err);
                }
                None
            }
            "NICK" if message.source_nick() == Some(nick.as_str()) => {
                message.param(0).map(|changed| {
                    nick = changed.to_string();
                    IrcEvent::NickChanged { nick: nick.clone() }
                })
            }
            "PRIVMSG" => match (message.param(0), message.param(1)) {
                (Some(target), Some(text)) => Some(IrcEvent::Privmsg {
                    target: target.to_string(),
                    nick: message.source_nick().unwrap_or_default().to_string(),
                    text: text.to_string(),
                }),
                _ => None,
            },
            "NOTICE" => message.param(1).map(|text| IrcEvent::Notice {
                nick: message.source_nick().unwrap_or_default().to_string(),
                text: text.to_string(),
            }),
            "ERROR" => {
                warn!(reason = message.trailing().unwrap_or_default(), "server error");
                None
            }
            _ => None,
        };

        if let Some(event) = event {
            if events.send(event).await.is_err() {
                break Ok(());
            }
        }
    };

    info!("IRC connection closed");
    let _ = events.send(IrcEvent::Disconnected).await;
    result
}
