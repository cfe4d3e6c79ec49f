//! Anonymous, read-only IRC chat source.
//!
//! Joins one channel per connection using the `justinfan` login, which the
//! chat service accepts without credentials, and turns tagged `PRIVMSG`
//! lines into [`RawChatEvent`]s.

use super::{ChatConnection, ChatSource, RawChatEvent};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// IRC connection settings
#[derive(Clone, Debug)]
pub struct IrcConfig {
    pub host: String,
    pub port: u16,
    pub nick: String,
}

/// Chat source backed by a plain-text IRC connection per room
pub struct IrcChatSource {
    config: IrcConfig,
}

impl IrcChatSource {
    pub fn new(config: IrcConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ChatSource for IrcChatSource {
    fn name(&self) -> &str {
        "irc"
    }

    async fn connect(&self, room: &str) -> Result<Box<dyn ChatConnection>> {
        info!(
            host = %self.config.host,
            port = self.config.port,
            room_id = %room,
            "Connecting to chat server"
        );

        let stream = TcpStream::connect((self.config.host.as_str(), self.config.port))
            .await
            .context("Failed to connect to chat server")?;
        let (reader, writer) = stream.into_split();

        let mut conn = IrcConnection {
            reader: BufReader::new(reader),
            writer,
            pending: VecDeque::new(),
        };

        conn.send("CAP REQ :twitch.tv/tags twitch.tv/commands").await?;
        conn.send("PASS SCHMOOPIIE").await?;
        conn.send(&format!("NICK {}", self.config.nick)).await?;
        conn.send(&format!("JOIN #{}", room)).await?;

        // Chat lines can arrive before the names list ends; keep them.
        loop {
            let line = match conn.read_line().await? {
                Some(line) => line,
                None => bail!("Chat server closed the connection while joining #{}", room),
            };
            let Some(parsed) = IrcLine::parse(&line) else {
                continue;
            };
            let command = parsed.command.clone();
            match command.as_str() {
                "PING" => conn.pong(&parsed).await?,
                "366" => break,
                "NOTICE" if parsed.trailing().map_or(false, is_login_failure) => {
                    bail!("Chat server rejected login: {}", parsed.trailing().unwrap_or_default())
                }
                "PRIVMSG" => {
                    if let Some(event) = parsed.into_chat_event() {
                        conn.pending.push_back(event);
                    }
                }
                _ => {}
            }
        }

        info!(room_id = %room, "Joined chat channel");
        Ok(Box::new(conn))
    }
}

fn is_login_failure(text: &str) -> bool {
    text.contains("Login unsuccessful") || text.contains("Login authentication failed")
}

struct IrcConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    pending: VecDeque<RawChatEvent>,
}

impl IrcConnection {
    async fn send(&mut self, line: &str) -> Result<()> {
        self.writer
            .write_all(format!("{}\r\n", line).as_bytes())
            .await
            .context("Failed to write to chat server")?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Next line without its terminator; lines that are not UTF-8 are skipped
    async fn read_line(&mut self) -> Result<Option<String>> {
        loop {
            let mut buf = Vec::new();
            let read = self
                .reader
                .read_until(b'\n', &mut buf)
                .await
                .context("Failed to read from chat server")?;
            if read == 0 {
                return Ok(None);
            }

            match String::from_utf8(buf) {
                Ok(line) => {
                    return Ok(Some(
                        line.trim_end_matches(|c| c == '\r' || c == '\n').to_string(),
                    ))
                }
                Err(e) => warn!(error = %e, "Skipping chat line that is not valid UTF-8"),
            }
        }
    }

    async fn pong(&mut self, ping: &IrcLine) -> Result<()> {
        let payload = ping.trailing().unwrap_or("tmi.twitch.tv").to_string();
        self.send(&format!("PONG :{}", payload)).await
    }
}

#[async_trait]
impl ChatConnection for IrcConnection {
    async fn next_event(&mut self) -> Result<Option<RawChatEvent>> {
        if let Some(event) = self.pending.pop_front() {
            return Ok(Some(event));
        }

        loop {
            let line = match self.read_line().await? {
                Some(line) => line,
                None => return Ok(None),
            };
            let Some(parsed) = IrcLine::parse(&line) else {
                continue;
            };
            let command = parsed.command.clone();
            match command.as_str() {
                "PING" => self.pong(&parsed).await?,
                // Server is about to restart; treat as a dropped connection
                "RECONNECT" => return Ok(None),
                "PRIVMSG" => {
                    if let Some(event) = parsed.into_chat_event() {
                        return Ok(Some(event));
                    }
                }
                other => debug!(command = %other, "Ignoring chat server line"),
            }
        }
    }
}

/// One parsed IRC line: `[@tags] [:prefix] COMMAND [params] [:trailing]`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IrcLine {
    pub tags: Vec<(String, String)>,
    pub prefix: Option<String>,
    pub command: String,
    pub params: Vec<String>,
}

impl IrcLine {
    pub fn parse(line: &str) -> Option<Self> {
        let mut rest = line.trim_end();

        let mut tags = Vec::new();
        if let Some(stripped) = rest.strip_prefix('@') {
            let (raw_tags, tail) = stripped.split_once(' ')?;
            for tag in raw_tags.split(';') {
                let (key, value) = tag.split_once('=').unwrap_or((tag, ""));
                tags.push((key.to_string(), unescape_tag(value)));
            }
            rest = tail.trim_start();
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (p, tail) = stripped.split_once(' ')?;
            prefix = Some(p.to_string());
            rest = tail.trim_start();
        }

        let (head, trailing) = match rest.split_once(" :") {
            Some((head, trailing)) => (head, Some(trailing)),
            None => (rest, None),
        };
        let mut words = head.split_whitespace();
        let command = words.next()?.to_string();
        let mut params: Vec<String> = words.map(str::to_string).collect();
        if let Some(trailing) = trailing {
            params.push(trailing.to_string());
        } else if let Some(last) = params.last_mut() {
            if let Some(stripped) = last.strip_prefix(':').map(str::to_string) {
                *last = stripped;
            }
        }

        Some(Self {
            tags,
            prefix,
            command,
            params,
        })
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Converts a `PRIVMSG` into a raw chat event; `/me` actions yield `None`
    pub fn into_chat_event(self) -> Option<RawChatEvent> {
        if self.command != "PRIVMSG" || self.params.len() < 2 {
            return None;
        }
        let text = self.trailing()?.to_string();
        if text.starts_with("\u{1}ACTION") {
            return None;
        }

        let login = self
            .prefix
            .as_deref()
            .and_then(|p| p.split('!').next())
            .map(str::to_string);

        Some(RawChatEvent {
            text,
            display_name: self.tag("display-name").map(str::to_string),
            login,
            user_id: self.tag("user-id").map(str::to_string),
            color: self.tag("color").map(str::to_string),
            emotes: self.tag("emotes").map(parse_emotes_tag).unwrap_or_default(),
        })
    }
}

/// Parses `25:0-4,12-16/1902:6-10` keeping tag order
pub(crate) fn parse_emotes_tag(value: &str) -> Vec<(String, Vec<String>)> {
    value
        .split('/')
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let (id, ranges) = entry.split_once(':')?;
            let ranges = ranges
                .split(',')
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect();
            Some((id.to_string(), ranges))
        })
        .collect()
}

fn unescape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(':') => out.push(';'),
            Some('s') => out.push(' '),
            Some('\\') => out.push('\\'),
            Some('r') => out.push('\r'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}
