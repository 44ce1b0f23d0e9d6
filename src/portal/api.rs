//! Portal HTTP API client.
//!
//! The engine talks to the server exclusively through the [`PortalApi`] trait
//! so tests can swap the transport for an in-memory fake. [`HttpPortalApi`] is
//! the production implementation over reqwest.

use crate::portal::error::PortalError;
use crate::portal::types::{ChatsResp, Contact, ErrorResp, Message, MessagesResp};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};
use uuid::Uuid;

/// An image file the caller wants to send, already read into memory.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// The five operations the portal server exposes to its clients.
#[async_trait]
pub trait PortalApi: Send + Sync {
    /// `GET /api/chats?phone_id=P`
    async fn fetch_chats(&self, phone_id: &str) -> Result<Vec<Contact>, PortalError>;

    /// `GET /api/chats/{wa_id}?phone_id=P`
    async fn fetch_messages(&self, wa_id: &str, phone_id: &str)
        -> Result<Vec<Message>, PortalError>;

    /// `POST /api/respond`
    async fn send_text(
        &self,
        wa_id: &str,
        body: &str,
        phone_id: &str,
        name: Option<&str>,
    ) -> Result<(), PortalError>;

    /// `POST /api/send-image` (multipart)
    async fn send_image(
        &self,
        wa_id: &str,
        phone_id: &str,
        image: ImageUpload,
        caption: &str,
        name: &str,
    ) -> Result<(), PortalError>;

    /// `POST /api/mark-read`
    async fn mark_read(&self, wa_id: &str, phone_id: &str) -> Result<(), PortalError>;
}

/// Production transport over reqwest.
pub struct HttpPortalApi {
    client: reqwest::Client,
    api_base_url: String,
}

impl HttpPortalApi {
    /// `client` should already carry whatever default headers the deployment
    /// needs; this type only adds per-request correlation ids.
    pub fn new(client: reqwest::Client, api_base_url: String) -> Self {
        Self {
            client,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }
}

/// Shared response handling: non-success statuses carry a JSON body with a
/// `message` field; success bodies deserialize into the expected shape.
async fn handle_response<T: DeserializeOwned>(
    response: reqwest::Response,
    operation: &str,
) -> Result<T, PortalError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ErrorResp>(&body)
            .map(|e| e.message)
            .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
        error!("[PortalAPI] {} failed, HTTP {}: {}", operation, status, message);
        return Err(PortalError::Server {
            status: status.as_u16(),
            message,
        });
    }
    debug!("[PortalAPI] {} ok, HTTP {}", operation, status);

    let parsed = serde_json::from_slice::<T>(&body).map_err(|e| {
        error!(
            "[PortalAPI] {} returned an unexpected body: {} (raw: {})",
            operation,
            e,
            String::from_utf8_lossy(&body)
        );
        PortalError::Decode(e)
    })?;
    Ok(parsed)
}

#[async_trait]
impl PortalApi for HttpPortalApi {
    async fn fetch_chats(&self, phone_id: &str) -> Result<Vec<Contact>, PortalError> {
        let request_id = Uuid::new_v4().to_string();
        let url = self.url("/api/chats");
        debug!("[PortalAPI] 📡 GET {} (phone_id={})", url, phone_id);

        let response = self
            .client
            .get(&url)
            .query(&[("phone_id", phone_id)])
            .header("X-Request-ID", &request_id)
            .send()
            .await?;

        let resp: ChatsResp = handle_response(response, "contact list fetch").await?;
        info!("[PortalAPI] ✅ contact list fetched, {} chats", resp.chats.len());
        Ok(resp.chats)
    }

    async fn fetch_messages(
        &self,
        wa_id: &str,
        phone_id: &str,
    ) -> Result<Vec<Message>, PortalError> {
        let request_id = Uuid::new_v4().to_string();
        let url = self.url(&format!("/api/chats/{}", wa_id));
        debug!("[PortalAPI] 📡 GET {} (phone_id={})", url, phone_id);

        let response = self
            .client
            .get(&url)
            .query(&[("phone_id", phone_id)])
            .header("X-Request-ID", &request_id)
            .send()
            .await?;

        let resp: MessagesResp = handle_response(response, "message fetch").await?;
        debug!(
            "[PortalAPI] message fetch for {} returned {} messages",
            wa_id,
            resp.messages.len()
        );
        Ok(resp.messages)
    }

    async fn send_text(
        &self,
        wa_id: &str,
        body: &str,
        phone_id: &str,
        name: Option<&str>,
    ) -> Result<(), PortalError> {
        let request_id = Uuid::new_v4().to_string();
        let url = self.url("/api/respond");

        let mut payload = serde_json::json!({
            "wa_id": wa_id,
            "message": body,
            "phone_id": phone_id,
        });
        if let Some(name) = name {
            payload["name"] = serde_json::Value::String(name.to_string());
        }

        info!("[PortalAPI] 📡 POST {} (wa_id={})", url, wa_id);
        let response = self
            .client
            .post(&url)
            .header("X-Request-ID", &request_id)
            .json(&payload)
            .send()
            .await?;

        let _: serde_json::Value = handle_response(response, "send").await?;
        Ok(())
    }

    async fn send_image(
        &self,
        wa_id: &str,
        phone_id: &str,
        image: ImageUpload,
        caption: &str,
        name: &str,
    ) -> Result<(), PortalError> {
        let request_id = Uuid::new_v4().to_string();
        let url = self.url("/api/send-image");

        let part = reqwest::multipart::Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.mime_type)?;
        let form = reqwest::multipart::Form::new()
            .text("wa_id", wa_id.to_string())
            .text("phone_id", phone_id.to_string())
            .text("caption", caption.to_string())
            .text("name", name.to_string())
            .part("image", part);

        info!("[PortalAPI] 📡 POST {} (wa_id={})", url, wa_id);
        let response = self
            .client
            .post(&url)
            .header("X-Request-ID", &request_id)
            .multipart(form)
            .send()
            .await?;

        let _: serde_json::Value = handle_response(response, "image send").await?;
        Ok(())
    }

    async fn mark_read(&self, wa_id: &str, phone_id: &str) -> Result<(), PortalError> {
        let request_id = Uuid::new_v4().to_string();
        let url = self.url("/api/mark-read");

        debug!("[PortalAPI] 📡 POST {} (wa_id={})", url, wa_id);
        let response = self
            .client
            .post(&url)
            .header("X-Request-ID", &request_id)
            .json(&serde_json::json!({
                "wa_id": wa_id,
                "phone_id": phone_id,
            }))
            .send()
            .await?;

        let _: serde_json::Value = handle_response(response, "mark read").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let api = HttpPortalApi::new(reqwest::Client::new(), "http://localhost:5000/".into());
        assert_eq!(api.url("/api/chats"), "http://localhost:5000/api/chats");
    }
}
