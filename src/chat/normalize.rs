use super::{Message, RawChatEvent};
use std::fmt;

/// Reasons a raw chat event is dropped instead of becoming a [`Message`]
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeError {
    MissingUserId,
    MissingDisplayName,
    InvalidEmoteRange(String),
    EmoteRangeOutOfBounds { range: String, len: usize },
}

impl fmt::Display for NormalizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeError::MissingUserId => write!(f, "user-id is required"),
            NormalizeError::MissingDisplayName => {
                write!(f, "display-name or login is required")
            }
            NormalizeError::InvalidEmoteRange(r) => {
                write!(f, "invalid emote range '{}': expected start-end", r)
            }
            NormalizeError::EmoteRangeOutOfBounds { range, len } => {
                write!(f, "emote range '{}' exceeds text length {}", range, len)
            }
        }
    }
}

impl std::error::Error for NormalizeError {}

/// Rendering URL for an emote id on the given CDN host
pub fn emote_url(cdn_host: &str, emote_id: &str) -> String {
    format!("https://{}/emoticons/v1/{}/3.0", cdn_host, emote_id)
}

/// Converts raw chat events into canonical messages.
#[derive(Debug, Clone)]
pub struct Normalizer {
    emote_cdn_host: String,
}

impl Normalizer {
    pub fn new(emote_cdn_host: impl Into<String>) -> Self {
        Self {
            emote_cdn_host: emote_cdn_host.into(),
        }
    }

    /// Builds a [`Message`] from a raw event.
    ///
    /// Every substring covered by an emote range is removed from the text
    /// (all occurrences, not only the ranged one), then whitespace runs are
    /// collapsed to a single space and the result is trimmed. Ranges are
    /// character offsets with an inclusive end, so the end is incremented by
    /// one before slicing.
    pub fn normalize(&self, raw: RawChatEvent) -> Result<Message, NormalizeError> {
        let user_id = raw
            .user_id
            .filter(|id| !id.is_empty())
            .ok_or(NormalizeError::MissingUserId)?;

        let display_name = raw
            .display_name
            .filter(|name| !name.is_empty())
            .or(raw.login.filter(|login| !login.is_empty()))
            .ok_or(NormalizeError::MissingDisplayName)?;

        let chars: Vec<char> = raw.text.chars().collect();
        let mut codes = Vec::new();
        let mut emotes = Vec::with_capacity(raw.emotes.len());

        for (emote_id, ranges) in &raw.emotes {
            for range in ranges {
                let (start, end) = parse_range(range)?;
                if start > end || end > chars.len() {
                    return Err(NormalizeError::EmoteRangeOutOfBounds {
                        range: range.clone(),
                        len: chars.len(),
                    });
                }
                codes.push(chars[start..end].iter().collect::<String>());
            }
            emotes.push(emote_url(&self.emote_cdn_host, emote_id));
        }

        let mut text = raw.text;
        for code in codes.iter().filter(|code| !code.is_empty()) {
            text = text.replace(code.as_str(), "");
        }

        Ok(Message {
            display_name,
            user_id,
            text: collapse_whitespace(&text),
            color: raw.color.filter(|c| !c.is_empty()),
            emotes,
        })
    }
}

/// Parses `"start-end"` into a half-open `(start, end + 1)` pair
fn parse_range(range: &str) -> Result<(usize, usize), NormalizeError> {
    let invalid = || NormalizeError::InvalidEmoteRange(range.to_string());
    let (start, end) = range.split_once('-').ok_or_else(invalid)?;
    let start: usize = start.trim().parse().map_err(|_| invalid())?;
    let end: usize = end.trim().parse().map_err(|_| invalid())?;
    let end = end.checked_add(1).ok_or_else(invalid)?;
    Ok((start, end))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
