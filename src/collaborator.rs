use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::constants::CHAT_PATH;

/// Why a call to the chat backend did not produce a reply.
///
/// Users only ever see the fixed fallback message; the variants exist so the
/// cause ends up in the logs.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("failed to reach chat backend at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("chat backend returned status {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response from chat backend: {0}")]
    Malformed(String),

    #[error("chat backend did not answer within {0:?}")]
    Timeout(Duration),
}

/// The remote service that turns a user message into an assistant reply.
#[async_trait]
pub trait Collaborator: Send + Sync {
    async fn reply(&self, message: &str) -> Result<String, CollaboratorError>;
}

// Wire shapes of POST /chat
#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    response: String,
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    error: String,
}

/// Talks to the backend over HTTP: `POST {base_url}/chat`.
#[derive(Debug, Clone)]
pub struct HttpCollaborator {
    client: Client,
    endpoint: String,
}

impl HttpCollaborator {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        let endpoint = format!("{}{}", base_url.trim_end_matches('/'), CHAT_PATH);
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Collaborator for HttpCollaborator {
    #[instrument(skip(self, message), fields(len = message.len()))]
    async fn reply(&self, message: &str) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest { message })
            .send()
            .await
            .map_err(|source| CollaboratorError::Transport {
                url: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| CollaboratorError::Transport {
                url: self.endpoint.clone(),
                source,
            })?;

        if !status.is_success() {
            // The backend reports failures as {"error": "..."}; keep the raw body otherwise.
            let body = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            debug!(%status, error_body = %body, "Chat backend request failed");
            return Err(CollaboratorError::Status { status, body });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| CollaboratorError::Malformed(e.to_string()))?;

        debug!(reply_len = parsed.response.len(), "Received chat backend reply");
        Ok(parsed.response)
    }
}
