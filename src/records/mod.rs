use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct RecordFlags: u32 {
        const SEEN = 0b00000001;
        const ANSWERED = 0b00000010;
        const CLOSED = 0b00000100;
        const FLAGGED = 0b00001000;
    }
}

/// Stable identifier of a record, normalized by the backend client.
/// Identity survives reloads; window positions do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One support email in the navigable collection.
#[derive(Debug, Clone)]
pub struct Record {
    pub id: RecordId,
    pub from_addr: String,
    pub from_name: Option<String>,
    pub subject: String,
    pub preview: Option<String>,
    pub body: RecordBody,
    /// Unix timestamp of receipt.
    pub received_at: i64,
    pub flags: RecordFlags,
    /// Conversation history, loaded lazily on first view.
    pub thread: Option<ConversationThread>,
}

impl Record {
    pub fn is_seen(&self) -> bool {
        self.flags.contains(RecordFlags::SEEN)
    }

    pub fn is_closed(&self) -> bool {
        self.flags.contains(RecordFlags::CLOSED)
    }

    pub fn display_from(&self) -> &str {
        self.from_name.as_deref().unwrap_or(&self.from_addr)
    }

    pub fn display_date(&self, format: &str) -> String {
        chrono::DateTime::from_timestamp(self.received_at, 0)
            .map(|dt| dt.format(format).to_string())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecordBody {
    pub text: Option<String>,
    pub html: Option<String>,
}

impl RecordBody {
    /// Get displayable text content
    /// Returns plain text if available, otherwise strips HTML tags from HTML content
    pub fn display_text(&self) -> String {
        if let Some(ref text) = self.text {
            text.clone()
        } else if let Some(ref html) = self.html {
            strip_html_tags(html)
        } else {
            "[No content]".to_string()
        }
    }
}

/// Convert HTML to readable plain text
fn strip_html_tags(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80).unwrap_or_default()
}

/// Conversation history attached to a record.
#[derive(Debug, Clone, Default)]
pub struct ConversationThread {
    pub messages: Vec<ThreadMessage>,
}

#[derive(Debug, Clone)]
pub struct ThreadMessage {
    pub author_addr: String,
    pub author_name: Option<String>,
    pub body: String,
    /// Unix timestamp of the message.
    pub sent_at: i64,
    /// True for messages sent by the support agent rather than the customer.
    pub outbound: bool,
}

impl ThreadMessage {
    pub fn display_author(&self) -> &str {
        self.author_name.as_deref().unwrap_or(&self.author_addr)
    }
}

/// An agent reply that closes the record once sent.
#[derive(Debug, Clone)]
pub struct ReplyDraft {
    pub subject: String,
    pub body: String,
}

impl ReplyDraft {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Build a quoted reply to the given record.
    pub fn reply_to(original: &Record, reply_body: &str) -> Self {
        let subject = if original.subject.starts_with("Re:") {
            original.subject.clone()
        } else {
            format!("Re: {}", original.subject)
        };

        let quoted_body = original
            .body
            .display_text()
            .lines()
            .map(|line| format!("> {}", line))
            .collect::<Vec<_>>()
            .join("\n");

        let body = format!(
            "{}\n\nOn {}, {} wrote:\n{}",
            reply_body,
            original.display_date("%b %d, %Y at %H:%M"),
            original.display_from(),
            quoted_body
        );

        Self { subject, body }
    }
}
