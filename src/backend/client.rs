use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};

use super::error::BackendError;
use super::session::Session;
use super::types::{
    JobId, ProcessedFile, ProcessedFileList, StatusResponse, Upload, UploadResponse,
};

const CHATFILES_PATH: &str = "/orders/chatfiles/";
const PROCESSED_FILES_PATH: &str = "/orders/processed-files/";

/// Per-call timeouts. Uploads get a longer budget than status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub request: Duration,
    pub upload: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(30),
            upload: Duration::from_secs(60),
        }
    }
}

/// The remote operations the polling workflow depends on.
///
/// Implemented by [`BackendClient`] over HTTP; tests substitute scripted
/// in-memory backends.
pub trait JobBackend {
    /// Upload a chat export, returning the id the backend assigned to it.
    async fn upload(&self, upload: &Upload) -> Result<JobId, BackendError>;

    /// Ask the backend to start processing an uploaded file.
    async fn trigger_processing(&self, id: &JobId) -> Result<(), BackendError>;

    /// Query the current processing state of a job.
    async fn fetch_status(&self, id: &JobId) -> Result<StatusResponse, BackendError>;
}

pub struct BackendClient {
    client: Client,
    base_url: String,
    session: Session,
    timeouts: Timeouts,
}

impl BackendClient {
    pub fn new(
        base_url: impl Into<String>,
        session: Session,
        timeouts: Timeouts,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.upload.max(timeouts.request))
            .build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            session,
            timeouts,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn chatfile_url(&self, id: &JobId) -> String {
        self.url(&format!("{CHATFILES_PATH}{id}/"))
    }

    /// Find the processed spreadsheet produced from the given chat file.
    ///
    /// Returns `Ok(None)` when the listing has no matching record yet.
    pub async fn processed_file(&self, id: &JobId) -> Result<Option<ProcessedFile>, BackendError> {
        let request = self
            .client
            .get(self.url(PROCESSED_FILES_PATH))
            .timeout(self.timeouts.request);
        let response = check(self.session.authorize(request).send().await?).await?;
        let list: ProcessedFileList = decode(response).await?;
        Ok(list.into_files().into_iter().find(|f| &f.chatfile == id))
    }

    /// Download the bytes of a processed spreadsheet.
    pub async fn download(&self, processed_id: &JobId) -> Result<Vec<u8>, BackendError> {
        let url = self.url(&format!("{PROCESSED_FILES_PATH}{processed_id}/download/"));
        let request = self.client.get(url).timeout(self.timeouts.upload);
        let response = check(self.session.authorize(request).send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

impl JobBackend for BackendClient {
    async fn upload(&self, upload: &Upload) -> Result<JobId, BackendError> {
        let part = Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str("text/plain")?;
        let form = Form::new().part("filepath", part);

        let request = self
            .client
            .post(self.url(CHATFILES_PATH))
            .multipart(form)
            .timeout(self.timeouts.upload);
        let response = check(self.session.authorize(request).send().await?).await?;
        let body: UploadResponse = decode(response).await?;
        Ok(body.into_id())
    }

    async fn trigger_processing(&self, id: &JobId) -> Result<(), BackendError> {
        let url = format!("{}process/", self.chatfile_url(id));
        let request = self
            .client
            .post(url)
            .json(&serde_json::json!({}))
            .timeout(self.timeouts.request);
        check(self.session.authorize(request).send().await?).await?;
        Ok(())
    }

    async fn fetch_status(&self, id: &JobId) -> Result<StatusResponse, BackendError> {
        let request = self
            .client
            .get(self.chatfile_url(id))
            .timeout(self.timeouts.request);
        let response = check(self.session.authorize(request).send().await?).await?;
        decode(response).await
    }
}

// Map 401 and any other non-2xx status to a typed error.
async fn check(response: Response) -> Result<Response, BackendError> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthorized);
    }

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        return Err(BackendError::Status {
            status: status.as_u16(),
            message,
        });
    }

    Ok(response)
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| BackendError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, token: Option<&str>) -> BackendClient {
        BackendClient::new(
            server.uri(),
            Session::new(token.map(String::from)),
            Timeouts::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn upload_sends_multipart_and_reads_wrapped_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders/chatfiles/"))
            .and(header("Authorization", "Token abc"))
            .and(body_string_contains("name=\"filepath\""))
            .and(body_string_contains("filename=\"chat.txt\""))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"data": {"id": 42}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("abc"));
        let id = client
            .upload(&Upload::new("chat.txt", b"25/12/2023, 10:30 - A: hi".to_vec()))
            .await
            .unwrap();
        assert_eq!(id, JobId::new("42"));
    }

    #[tokio::test]
    async fn upload_rejection_surfaces_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders/chatfiles/"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid file"))
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .upload(&Upload::new("chat.txt", b"x".to_vec()))
            .await
            .unwrap_err();
        match err {
            BackendError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid file");
            }
            other => panic!("expected Status, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn upload_with_unexpected_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders/chatfiles/"))
            .respond_with(ResponseTemplate::new(201).set_body_string("<html>created</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server, None)
            .upload(&Upload::new("chat.txt", b"x".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[tokio::test]
    async fn trigger_posts_to_process_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders/chatfiles/7/process/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server, Some("t"))
            .trigger_processing(&JobId::new("7"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn fetch_status_parses_counts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/chatfiles/7/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": 7,
                "is_processed": true,
                "processing_error": null,
                "total_messages": 120,
                "total_orders": 9
            })))
            .mount(&server)
            .await;

        let status = client_for(&server, None)
            .fetch_status(&JobId::new("7"))
            .await
            .unwrap();
        assert!(status.is_processed);
        assert_eq!(status.total_messages, Some(120));
        assert_eq!(status.total_orders, Some(9));
    }

    #[tokio::test]
    async fn slow_status_hits_request_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/chatfiles/7/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"is_processed": true}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let timeouts = Timeouts {
            request: Duration::from_millis(100),
            ..Timeouts::default()
        };
        let client = BackendClient::new(server.uri(), Session::default(), timeouts).unwrap();
        let err = client.fetch_status(&JobId::new("7")).await.unwrap_err();

        assert!(matches!(err, BackendError::Network(_)));
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn expired_token_maps_to_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/chatfiles/7/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = client_for(&server, Some("expired"))
            .fetch_status(&JobId::new("7"))
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized));
    }

    #[tokio::test]
    async fn processed_file_lookup_matches_chatfile() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/processed-files/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    {"id": 1, "chatfile": 5, "file_name": "old.xlsx"},
                    {"id": 2, "chatfile": 7, "file_name": "orders_7.xlsx", "total_orders": 9}
                ]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let found = client.processed_file(&JobId::new("7")).await.unwrap().unwrap();
        assert_eq!(found.id, JobId::new("2"));
        assert_eq!(found.file_name, "orders_7.xlsx");

        let missing = client.processed_file(&JobId::new("99")).await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn download_returns_raw_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/processed-files/2/download/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x50, 0x4b, 0x03, 0x04]))
            .mount(&server)
            .await;

        let bytes = client_for(&server, None)
            .download(&JobId::new("2"))
            .await
            .unwrap();
        assert_eq!(bytes, vec![0x50, 0x4b, 0x03, 0x04]);
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = BackendClient::new(
            "http://localhost:8000/api/",
            Session::default(),
            Timeouts::default(),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000/api");
        assert_eq!(
            client.chatfile_url(&JobId::new("3")),
            "http://localhost:8000/api/orders/chatfiles/3/"
        );
    }
}
