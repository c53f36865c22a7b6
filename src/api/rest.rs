//! REST client for the support-inbox backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{PageFetch, RecordSource};
use crate::config::ApiConfig;
use crate::error::{NavError, Result};
use crate::records::{
    ConversationThread, Record, RecordBody, RecordFlags, RecordId, ReplyDraft, ThreadMessage,
};

/// HTTP client for the record list and mutation endpoints.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

#[derive(Deserialize)]
struct ListResponse {
    records: Vec<WireRecord>,
    total_pages: u32,
}

/// Record as the backend serializes it. Older backend versions omit `id`
/// and only carry `message_id`; identifiers are normalized on ingest so
/// the rest of the client never sees the difference.
#[derive(Deserialize)]
struct WireRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    message_id: Option<String>,
    from_addr: String,
    #[serde(default)]
    from_name: Option<String>,
    subject: String,
    #[serde(default)]
    preview: Option<String>,
    #[serde(default)]
    body_text: Option<String>,
    #[serde(default)]
    body_html: Option<String>,
    received_at: i64,
    #[serde(default)]
    read: bool,
    #[serde(default)]
    answered: bool,
    #[serde(default)]
    closed: bool,
}

impl WireRecord {
    fn normalize(self) -> Option<Record> {
        let id = match self.id.or(self.message_id) {
            Some(id) => RecordId::new(id),
            None => {
                tracing::warn!("Dropping record without id or message_id: {}", self.subject);
                return None;
            }
        };

        let mut flags = RecordFlags::empty();
        flags.set(RecordFlags::SEEN, self.read);
        flags.set(RecordFlags::ANSWERED, self.answered);
        flags.set(RecordFlags::CLOSED, self.closed);

        Some(Record {
            id,
            from_addr: self.from_addr,
            from_name: self.from_name,
            subject: self.subject,
            preview: self.preview,
            body: RecordBody {
                text: self.body_text,
                html: self.body_html,
            },
            received_at: self.received_at,
            flags,
            thread: None,
        })
    }
}

#[derive(Deserialize)]
struct ThreadResponse {
    messages: Vec<WireThreadMessage>,
}

#[derive(Deserialize)]
struct WireThreadMessage {
    author_addr: String,
    #[serde(default)]
    author_name: Option<String>,
    body: String,
    sent_at: i64,
    #[serde(default)]
    outbound: bool,
}

#[derive(Serialize)]
struct MarkReadRequest<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct ReplyRequest<'a> {
    id: &'a str,
    subject: &'a str,
    body: &'a str,
}

impl RestClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Fail on non-2xx, carrying the response body for diagnostics.
    async fn check(response: reqwest::Response, endpoint: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(NavError::Status {
                status,
                endpoint: endpoint.to_string(),
                detail,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl RecordSource for RestClient {
    async fn fetch_page(&self, page: u32) -> Result<PageFetch> {
        let url = self.url("/records");
        let response = self
            .request(self.client.get(&url).query(&[("page", page)]))
            .send()
            .await?;
        let response = Self::check(response, "/records").await?;

        let list: ListResponse = response.json().await?;
        let records: Vec<Record> = list
            .records
            .into_iter()
            .filter_map(WireRecord::normalize)
            .collect();

        tracing::debug!(
            "Fetched page {}: {} records, {} total pages",
            page,
            records.len(),
            list.total_pages
        );

        Ok(PageFetch {
            records,
            total_pages: list.total_pages,
        })
    }

    async fn mark_read(&self, id: &RecordId) -> Result<()> {
        let url = self.url("/records/mark-read");
        let response = self
            .request(self.client.post(&url).json(&MarkReadRequest { id: id.as_str() }))
            .send()
            .await?;
        Self::check(response, "/records/mark-read").await?;
        Ok(())
    }

    async fn delete(&self, id: &RecordId) -> Result<()> {
        let url = self.url("/records");
        let response = self
            .request(self.client.delete(&url).query(&[("id", id.as_str())]))
            .send()
            .await?;
        Self::check(response, "/records").await?;
        Ok(())
    }

    async fn reply_and_close(&self, id: &RecordId, reply: &ReplyDraft) -> Result<()> {
        let url = self.url("/records/reply-and-close");
        let response = self
            .request(self.client.post(&url).json(&ReplyRequest {
                id: id.as_str(),
                subject: &reply.subject,
                body: &reply.body,
            }))
            .send()
            .await?;
        Self::check(response, "/records/reply-and-close").await?;
        Ok(())
    }

    async fn fetch_thread(&self, id: &RecordId) -> Result<ConversationThread> {
        let url = self.url(&format!("/records/{}/thread", id));
        let response = self.request(self.client.get(&url)).send().await?;
        let response = Self::check(response, "/records/{id}/thread").await?;

        let thread: ThreadResponse = response.json().await?;
        Ok(ConversationThread {
            messages: thread
                .messages
                .into_iter()
                .map(|m| ThreadMessage {
                    author_addr: m.author_addr,
                    author_name: m.author_name,
                    body: m.body,
                    sent_at: m.sent_at,
                    outbound: m.outbound,
                })
                .collect(),
        })
    }
}
