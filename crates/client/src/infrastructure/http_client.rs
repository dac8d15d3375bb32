//! reqwest clients for the storefront REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use storefront_domain::upload::validate_image;
use storefront_domain::{
    BatchUploadOutcome, Notification, NotificationId, UploadFile, UploadOutcome, UploadedImage,
};

use crate::ports::{ApiError, NotificationsApi};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared plumbing: base URL, bearer token and status handling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: Option<Arc<str>>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        // Url::join drops the last segment unless the base ends with '/'
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalized)
            .map_err(|e| ApiError::RequestFailed(format!("invalid base URL {base_url}: {e}")))?;
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Ok(Self {
            client,
            base_url,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(Arc::from(token.into()));
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ApiError::RequestFailed(e.to_string()))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ApiError::HttpStatus {
            status: status.as_u16(),
            message: error_message(&body).unwrap_or_else(|| {
                status.canonical_reason().unwrap_or("request failed").to_string()
            }),
        })
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::ParseError(e.to_string()))
    }
}

/// Pull `message` out of a `{ "message": ... }` error body.
fn error_message(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.message)
}

#[derive(Debug, Deserialize)]
struct NotificationList {
    #[serde(default, alias = "notifications")]
    data: Vec<Notification>,
}

/// [`NotificationsApi`] over HTTP.
#[derive(Clone)]
pub struct HttpNotificationsApi {
    api: ApiClient,
}

impl HttpNotificationsApi {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl NotificationsApi for HttpNotificationsApi {
    async fn list(&self) -> Result<Vec<Notification>, ApiError> {
        let url = self.api.endpoint("notifications")?;
        let response = self.api.send(self.api.client.get(url)).await?;
        let list: NotificationList = ApiClient::parse(response).await?;
        tracing::debug!(count = list.data.len(), "Fetched notification history");
        Ok(list.data)
    }

    async fn mark_read(&self, id: &NotificationId) -> Result<(), ApiError> {
        let url = self.api.endpoint(&format!("notifications/{id}/read"))?;
        self.api.send(self.api.client.patch(url)).await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        let url = self.api.endpoint("notifications/read-all")?;
        self.api.send(self.api.client.patch(url)).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(alias = "image")]
    data: UploadedImage,
}

/// Image uploads to the `/upload` endpoint.
#[derive(Clone)]
pub struct UploadClient {
    api: ApiClient,
}

impl UploadClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Validate and upload one image. Never fails: errors become a failed outcome.
    pub async fn upload_image(&self, file: UploadFile) -> UploadOutcome<UploadedImage> {
        if let Err(e) = validate_image(&file) {
            tracing::debug!(file = %file.name, error = %e, "Upload rejected before sending");
            return UploadOutcome::failed(e.to_string());
        }

        match self.send_image(file).await {
            Ok(image) => UploadOutcome::ok(image),
            Err(e) => {
                tracing::warn!(error = %e, "Image upload failed");
                UploadOutcome::failed(e.to_string())
            }
        }
    }

    /// Upload every file independently; one failure does not cancel the others.
    pub async fn upload_images(
        &self,
        files: Vec<UploadFile>,
    ) -> BatchUploadOutcome<UploadedImage> {
        let outcomes = join_all(files.into_iter().map(|f| self.upload_image(f))).await;
        let batch = BatchUploadOutcome::collect(outcomes);
        if !batch.success {
            tracing::warn!(
                failed = batch.failed,
                uploaded = batch.data.len(),
                "Batch upload incomplete"
            );
        }
        batch
    }

    async fn send_image(&self, file: UploadFile) -> Result<UploadedImage, ApiError> {
        let part = multipart::Part::bytes(file.bytes)
            .file_name(file.name)
            .mime_str(&file.mime_type)
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;
        let form = multipart::Form::new().part("image", part);

        let url = self.api.endpoint("upload")?;
        let response = self.api.send(self.api.client.post(url).multipart(form)).await?;
        let body: UploadResponse = ApiClient::parse(response).await?;
        Ok(body.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = ApiClient::new("http://localhost:5000/api").unwrap();
        assert_eq!(
            api.endpoint("notifications/read-all").unwrap().as_str(),
            "http://localhost:5000/api/notifications/read-all"
        );

        let trailing = ApiClient::new("http://localhost:5000/api/").unwrap();
        assert_eq!(
            trailing.endpoint("/upload").unwrap().as_str(),
            "http://localhost:5000/api/upload"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ApiClient::new("not a url"),
            Err(ApiError::RequestFailed(_))
        ));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(
            error_message(r#"{"success": false, "message": "Not authorized"}"#).as_deref(),
            Some("Not authorized")
        );
        assert_eq!(error_message("<html>502</html>"), None);
    }

    #[test]
    fn test_notification_list_envelopes() {
        let json = r#"{"success": true, "notifications": [
            {"_id": "n1", "createdAt": "2024-05-01T12:00:00Z", "type": "order", "message": "Shipped"}
        ]}"#;
        let list: NotificationList = serde_json::from_str(json).unwrap();
        assert_eq!(list.data.len(), 1);
        assert_eq!(list.data[0].id.as_str(), "n1");

        let empty: NotificationList = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(empty.data.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_file_fails_without_request() {
        // Nothing listens on port 9; validation must reject before any request
        let uploads = UploadClient::new(ApiClient::new("http://127.0.0.1:9/api").unwrap());
        let pdf = UploadFile::new("terms.pdf", "application/pdf", vec![1, 2, 3]);

        let outcome = uploads.upload_image(pdf).await;
        assert!(!outcome.success);
        assert_eq!(
            outcome.message.as_deref(),
            Some("Only JPEG, PNG, WEBP and GIF images are allowed")
        );
    }
}
