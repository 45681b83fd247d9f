use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;
use tokio::time::Duration;

use crate::config::Config;
use crate::error::DispatchError;
use crate::models::{ChatReply, OtpReply};
use crate::session::SessionId;

/// Remote chat endpoint the conversation controller talks to.
///
/// Implementors own transport and decoding; the controller only sees decoded
/// replies or a [`DispatchError`].
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Relay one user message and return the decoded reply.
    async fn post_message(&self, message: &str, session: &SessionId)
        -> Result<ChatReply, DispatchError>;

    /// Ask the service to send a one-time password to `phone`.
    async fn request_otp(&self, phone: &str, session: &SessionId)
        -> Result<OtpReply, DispatchError>;

    /// Check the one-time password the user typed.
    async fn verify_otp(
        &self,
        phone: &str,
        code: &str,
        session: &SessionId,
    ) -> Result<OtpReply, DispatchError>;
}

#[derive(Serialize)]
struct ChatRequestBody<'a> {
    message: &'a str,
    session_id: &'a str,
}

#[derive(Serialize)]
struct SendOtpBody<'a> {
    phone: &'a str,
    session_id: &'a str,
}

#[derive(Serialize)]
struct VerifyOtpBody<'a> {
    phone: &'a str,
    otp: &'a str,
    session_id: &'a str,
}

/// HTTP client for the chat service
#[derive(Clone)]
pub struct HttpChatService {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpChatService {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.get_api_key(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body and decode the JSON response, mapping failures onto [`DispatchError`].
    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, DispatchError> {
        let url = format!("{}{}", self.base_url, path);

        let mut request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        tracing::debug!(%url, "sending request");
        let response = request.send().await.map_err(|e| {
            tracing::warn!(%url, error = %e, "chat service unreachable");
            DispatchError::Transport(e.to_string())
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| DispatchError::Transport(e.to_string()))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<Value>(&text).ok().and_then(|body| {
                ["detail", "message"].iter().find_map(|key| body.get(*key).and_then(detail_text))
            });
            tracing::warn!(
                %url,
                status = status.as_u16(),
                ?detail,
                "chat service returned an error status"
            );
            return Err(DispatchError::Http { status: status.as_u16(), detail });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Error detail as shown to the user. Validation errors carry structured detail.
fn detail_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl ChatService for HttpChatService {
    async fn post_message(
        &self,
        message: &str,
        session: &SessionId,
    ) -> Result<ChatReply, DispatchError> {
        let body = ChatRequestBody { message, session_id: session.as_str() };
        let value = self.post_json("/chat", &body).await?;
        ChatReply::from_value(value)
    }

    async fn request_otp(
        &self,
        phone: &str,
        session: &SessionId,
    ) -> Result<OtpReply, DispatchError> {
        let body = SendOtpBody { phone, session_id: session.as_str() };
        let value = self.post_json("/auth/send-otp", &body).await?;
        OtpReply::from_value(value)
    }

    async fn verify_otp(
        &self,
        phone: &str,
        code: &str,
        session: &SessionId,
    ) -> Result<OtpReply, DispatchError> {
        let body = VerifyOtpBody { phone, otp: code, session_id: session.as_str() };
        let value = self.post_json("/auth/verify-otp", &body).await?;
        OtpReply::from_value(value)
    }
}
