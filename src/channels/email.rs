//! IMAP mailbox reader: fetches unseen mail over TLS (rustls) or plain TCP
//! and decodes it with `mail-parser`.
//!
//! The IMAP conversation is blocking and runs under `spawn_blocking`.
//! Fetched messages are flagged `\Seen`, which is what gives the reader its
//! "unseen since last check" semantics.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use mail_parser::{MessageParser, PartType};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::channels::mailbox::{FetchedRecord, MailboxReader, MailboxRecord};
use crate::config::{env_str, parse_bool, parse_or};
use crate::error::{ConfigError, MailboxError};

/// Socket read/connect timeout for the IMAP conversation.
const IMAP_TIMEOUT: Duration = Duration::from_secs(30);

static HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<a\s[^>]*?href\s*=\s*["']([^"']+)["'][^>]*>"#).expect("valid href regex")
});

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)[^>]*>.*?</(script|style)\s*>").expect("valid block regex")
});

// ── Configuration ───────────────────────────────────────────────────

/// Mailbox connection settings.
#[derive(Debug, Clone)]
pub struct MailboxConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub username: String,
    pub password: SecretString,
    /// TLS via rustls when true, plain TCP otherwise.
    pub use_tls: bool,
    /// Folder to read, normally `INBOX`.
    pub folder: String,
}

impl MailboxConfig {
    /// Build from environment-style lookups.
    ///
    /// Returns `Ok(None)` unless `EMAIL_IMAP_HOST`, `EMAIL_USER` and
    /// `EMAIL_PASSWORD` are all set.
    pub fn from_lookup<F>(lookup: &F) -> Result<Option<Self>, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (Some(imap_host), Some(username), Some(password)) = (
            env_str(lookup, "EMAIL_IMAP_HOST"),
            env_str(lookup, "EMAIL_USER"),
            env_str(lookup, "EMAIL_PASSWORD"),
        ) else {
            return Ok(None);
        };

        Ok(Some(Self {
            imap_host,
            imap_port: parse_or(lookup, "EMAIL_IMAP_PORT", 993)?,
            username,
            password: SecretString::from(password),
            use_tls: parse_bool(env_str(lookup, "EMAIL_USE_SSL").as_deref(), true),
            folder: env_str(lookup, "EMAIL_FOLDER").unwrap_or_else(|| "INBOX".to_string()),
        }))
    }
}

// ── Reader ──────────────────────────────────────────────────────────

/// IMAP implementation of [`MailboxReader`].
pub struct ImapMailbox {
    config: Option<MailboxConfig>,
}

impl ImapMailbox {
    /// A reader with no config reports `MailboxError::NotConfigured` on fetch.
    pub fn new(config: Option<MailboxConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl MailboxReader for ImapMailbox {
    fn name(&self) -> &str {
        "imap"
    }

    async fn fetch_unseen(&self) -> Result<Vec<FetchedRecord>, MailboxError> {
        let Some(config) = self.config.clone() else {
            return Err(MailboxError::NotConfigured(
                "EMAIL_IMAP_HOST, EMAIL_USER and EMAIL_PASSWORD must be set".into(),
            ));
        };

        tokio::task::spawn_blocking(move || fetch_unseen_imap(&config))
            .await
            .map_err(|e| MailboxError::Protocol(format!("IMAP fetch task panicked: {e}")))?
    }
}

// ── IMAP session ────────────────────────────────────────────────────

/// Tagged response to one IMAP command.
struct ImapResponse {
    /// Untagged lines, in order.
    lines: Vec<String>,
    /// Literal payloads (`{n}` blocks), in order.
    literals: Vec<Vec<u8>>,
    /// Whether the tagged completion was `OK`.
    ok: bool,
    status: String,
}

struct ImapSession<S: Read + Write> {
    stream: S,
    next_tag: u32,
}

impl<S: Read + Write> ImapSession<S> {
    fn new(stream: S) -> Self {
        Self { stream, next_tag: 1 }
    }

    fn read_line(&mut self) -> Result<Vec<u8>, MailboxError> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte)? {
                0 => return Err(MailboxError::Protocol("IMAP connection closed".into())),
                _ => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(buf);
                    }
                }
            }
        }
    }

    fn command(&mut self, cmd: &str) -> Result<ImapResponse, MailboxError> {
        let tag = format!("A{}", self.next_tag);
        self.next_tag += 1;

        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;

        let tag_prefix = format!("{tag} ");
        let mut lines = Vec::new();
        let mut literals = Vec::new();
        loop {
            let raw = self.read_line()?;
            if let Some(len) = literal_len(&raw) {
                let mut literal = vec![0u8; len];
                self.stream.read_exact(&mut literal)?;
                literals.push(literal);
            }
            let line = String::from_utf8_lossy(&raw).trim_end().to_string();
            if let Some(rest) = line.strip_prefix(&tag_prefix) {
                return Ok(ImapResponse {
                    lines,
                    literals,
                    ok: rest.starts_with("OK"),
                    status: rest.to_string(),
                });
            }
            lines.push(line);
        }
    }
}

/// Length of a `{n}` literal announced at the end of a response line.
fn literal_len(line: &[u8]) -> Option<usize> {
    let line = std::str::from_utf8(line).ok()?.trim_end();
    let inner = line.strip_suffix('}')?;
    let open = inner.rfind('{')?;
    inner[open + 1..].trim_end_matches('+').parse().ok()
}

/// Quote a string for an IMAP command argument.
fn imap_quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Connect, then run the fetch conversation over TLS or plain TCP.
fn fetch_unseen_imap(config: &MailboxConfig) -> Result<Vec<FetchedRecord>, MailboxError> {
    let connect_err = |reason: String| MailboxError::Connect {
        host: config.imap_host.clone(),
        port: config.imap_port,
        reason,
    };

    let addr = (config.imap_host.as_str(), config.imap_port)
        .to_socket_addrs()
        .map_err(|e| connect_err(e.to_string()))?
        .next()
        .ok_or_else(|| connect_err("no address resolved".into()))?;
    let tcp = TcpStream::connect_timeout(&addr, IMAP_TIMEOUT).map_err(|e| connect_err(e.to_string()))?;
    tcp.set_read_timeout(Some(IMAP_TIMEOUT))?;
    tcp.set_write_timeout(Some(IMAP_TIMEOUT))?;

    if !config.use_tls {
        return run_session(&mut ImapSession::new(tcp), config);
    }

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = rustls_pki_types::ServerName::try_from(config.imap_host.clone())
        .map_err(|e| connect_err(format!("invalid server name: {e}")))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| connect_err(format!("TLS setup failed: {e}")))?;

    run_session(&mut ImapSession::new(rustls::StreamOwned::new(conn, tcp)), config)
}

fn run_session<S: Read + Write>(
    session: &mut ImapSession<S>,
    config: &MailboxConfig,
) -> Result<Vec<FetchedRecord>, MailboxError> {
    let _greeting = session.read_line()?;

    let login = session.command(&format!(
        "LOGIN {} {}",
        imap_quote(&config.username),
        imap_quote(config.password.expose_secret())
    ))?;
    if !login.ok {
        return Err(MailboxError::AuthFailed {
            user: config.username.clone(),
        });
    }

    let select = session.command(&format!("SELECT {}", imap_quote(&config.folder)))?;
    if !select.ok {
        return Err(MailboxError::Protocol(format!(
            "SELECT {} failed: {}",
            config.folder, select.status
        )));
    }

    let search = session.command("SEARCH UNSEEN")?;
    if !search.ok {
        return Err(MailboxError::Protocol(format!("SEARCH failed: {}", search.status)));
    }
    let seqs = parse_search(&search.lines);
    debug!(count = seqs.len(), "Unseen messages found");

    let mut results = Vec::with_capacity(seqs.len());
    for seq in &seqs {
        let fetched = match session.command(&format!("FETCH {seq} RFC822")) {
            Ok(resp) => resp,
            Err(e) => {
                warn!(seq = %seq, error = %e, "IMAP connection lost mid-fetch; keeping earlier messages");
                break;
            }
        };

        let record = match (fetched.ok, fetched.literals.first()) {
            (true, Some(raw)) => parse_message(raw, seq),
            _ => Err(MailboxError::Decode {
                reference: seq.clone(),
                reason: format!("FETCH returned no message body ({})", fetched.status),
            }),
        };
        results.push(record);

        if let Err(e) = session.command(&format!("STORE {seq} +FLAGS (\\Seen)")) {
            warn!(seq = %seq, error = %e, "Failed to mark message as seen");
        }
    }

    let _ = session.command("LOGOUT");
    info!(count = results.len(), host = %config.imap_host, "Mailbox fetch complete");
    Ok(results)
}

/// Sequence numbers from `* SEARCH` lines.
fn parse_search(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .filter_map(|l| l.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace().map(str::to_string))
        .collect()
}

// ── Decoding ────────────────────────────────────────────────────────

/// Decode a raw RFC 822 message. `reference` identifies it in errors.
pub fn parse_message(raw: &[u8], reference: &str) -> FetchedRecord {
    let decode_err = |reason: &str| MailboxError::Decode {
        reference: reference.to_string(),
        reason: reason.to_string(),
    };

    let parsed = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| decode_err("not a parseable RFC 822 message"))?;

    let message_id = parsed
        .message_id()
        .map(|id| id.trim().trim_matches(|c| c == '<' || c == '>').to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| decode_err("missing Message-ID header"))?;

    let subject = parsed.subject().unwrap_or_default().to_string();
    Ok(MailboxRecord {
        message_id,
        subject,
        body: extract_body(&parsed),
    })
}

/// All text/plain bodies joined; HTML-only mail is converted to text.
fn extract_body(parsed: &mail_parser::Message<'_>) -> String {
    let plain: Vec<&str> = parsed
        .text_bodies()
        .filter_map(|part| match &part.body {
            PartType::Text(text) => Some(text.as_ref()),
            _ => None,
        })
        .collect();
    if !plain.is_empty() {
        return plain.join("\n");
    }

    parsed
        .html_bodies()
        .filter_map(|part| match &part.body {
            PartType::Html(html) => Some(html_to_text(html)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Strip HTML tags, keeping link targets inline so URL extraction still
/// sees them.
pub fn html_to_text(html: &str) -> String {
    let without_blocks = SCRIPT_STYLE_RE.replace_all(html, " ");
    let with_links = HREF_RE.replace_all(&without_blocks, " $1 ");
    decode_entities(&strip_html(&with_links))
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

// ── Tests ───────────────────────────────────────────────────────────
