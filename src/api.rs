//! HTTP client for the remote desktop-printing service

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::auth::Session;
use crate::deeplink::PrintMode;
use crate::document::Document;
use crate::error::{AuthError, FetchError, NotificationError};

/// Path prefix shared by every endpoint of the service.
pub const API_PREFIX: &str = "/api/v1/afi-desktop-printing";

/// Frame number that fetches the service's test document instead.
pub const DUMMY_IDENTIFIER: &str = "dummy";

/// Returns the ordered documents to print for one frame number.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, identifier: &str, mode: &PrintMode) -> Result<Vec<Document>, FetchError>;
}

/// Tells the service which frame numbers printed completely.
#[async_trait]
pub trait SuccessNotifier: Send + Sync {
    async fn notify(
        &self,
        route: NotificationRoute,
        identifiers: &[String],
    ) -> Result<(), NotificationError>;
}

/// Success endpoint chosen by printing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationRoute {
    PrintingSuccess,
    ReprintingSuccess,
}

impl NotificationRoute {
    /// `Print` goes to printing-success. `Reprint` and any unrecognised mode
    /// go to reprinting-success.
    pub fn for_mode(mode: &PrintMode) -> Self {
        match mode {
            PrintMode::Print => NotificationRoute::PrintingSuccess,
            PrintMode::Reprint | PrintMode::Other(_) => NotificationRoute::ReprintingSuccess,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            NotificationRoute::PrintingSuccess => "printing-success",
            NotificationRoute::ReprintingSuccess => "reprinting-success",
        }
    }
}

/// Document as the service sends it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireDocument {
    pub base64: String,
    #[serde(default)]
    pub blob_id: Option<String>,
    pub document_type: String,
}

impl WireDocument {
    fn into_document(self, identifier: &str) -> Result<Document, FetchError> {
        let payload = STANDARD
            .decode(self.base64.trim())
            .map_err(|source| FetchError::Payload {
                document_type: self.document_type.clone(),
                source,
            })?;
        Ok(Document::new(identifier, self.document_type, payload))
    }
}

#[derive(Serialize)]
struct SucceededFrameNumbers<'a> {
    #[serde(rename = "frameNumbers")]
    frame_numbers: &'a [String],
}

/// reqwest-backed client for the service.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        session: Session,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}/{}", self.base_url, API_PREFIX, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let request = self.http.get(self.endpoint(path));
        match self.session.cookie_header() {
            Some(cookie) => request.header(reqwest::header::COOKIE, cookie),
            None => request,
        }
    }

    async fn get_checked(&self, path: &str) -> Result<reqwest::Response, FetchError> {
        let response = self.get(path).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = if body.trim().is_empty() {
            format!("Failed to get files. HTTP {}", status)
        } else {
            body
        };
        Err(FetchError::Rejected { status: status.as_u16(), message })
    }

    async fn get_documents(
        &self,
        path: &str,
        identifier: &str,
    ) -> Result<Vec<Document>, FetchError> {
        let wire: Vec<WireDocument> = self.get_checked(path).await?.json().await?;
        wire.into_iter().map(|doc| doc.into_document(identifier)).collect()
    }

    /// Name of the user the session belongs to.
    pub async fn current_user(&self) -> Result<String, AuthError> {
        let response = self.get("get-auth-user").send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Rejected(status.as_u16()));
        }
        Ok(unquote(response.text().await?))
    }
}

/// Bodies may be a bare string or a JSON string literal.
fn unquote(body: String) -> String {
    serde_json::from_str::<String>(&body).unwrap_or(body)
}

#[async_trait]
impl DocumentFetcher for ApiClient {
    async fn fetch(&self, identifier: &str, mode: &PrintMode) -> Result<Vec<Document>, FetchError> {
        if identifier.eq_ignore_ascii_case(DUMMY_IDENTIFIER) {
            let body = unquote(self.get_checked("get-dummy-file").await?.text().await?);
            let dummy = WireDocument {
                base64: body,
                blob_id: None,
                document_type: "testing".to_string(),
            };
            return Ok(vec![dummy.into_document(identifier)?]);
        }

        match mode {
            PrintMode::Print => {
                let faktur: WireDocument = self
                    .get_checked(&format!("get-emsigner/{}", identifier))
                    .await?
                    .json()
                    .await?;
                let mut documents = vec![faktur.into_document(identifier)?];
                let support = format!("get-file-support-document/{}", identifier);
                documents.extend(self.get_documents(&support, identifier).await?);
                Ok(documents)
            }
            PrintMode::Reprint | PrintMode::Other(_) => {
                self.get_documents(&format!("get-files-for-reprint/{}", identifier), identifier)
                    .await
            }
        }
    }
}

#[async_trait]
impl SuccessNotifier for ApiClient {
    async fn notify(
        &self,
        route: NotificationRoute,
        identifiers: &[String],
    ) -> Result<(), NotificationError> {
        let mut request = self
            .http
            .post(self.endpoint(route.path()))
            .json(&SucceededFrameNumbers { frame_numbers: identifiers });
        if let Some(cookie) = self.session.cookie_header() {
            request = request.header(reqwest::header::COOKIE, cookie);
        }

        let status = request.send().await?.status();
        if !status.is_success() {
            return Err(NotificationError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_is_explicit_for_every_mode() {
        assert_eq!(
            NotificationRoute::for_mode(&PrintMode::Print),
            NotificationRoute::PrintingSuccess
        );
        assert_eq!(
            NotificationRoute::for_mode(&PrintMode::Reprint),
            NotificationRoute::ReprintingSuccess
        );
        assert_eq!(
            NotificationRoute::for_mode(&PrintMode::Other("Preview".into())),
            NotificationRoute::ReprintingSuccess
        );
    }

    #[test]
    fn endpoint_joins_base_and_prefix() {
        let client =
            ApiClient::new("http://host:3004/", Session::default(), Duration::from_secs(1))
                .unwrap();
        assert_eq!(
            client.endpoint("printing-success"),
            "http://host:3004/api/v1/afi-desktop-printing/printing-success"
        );
    }

    #[test]
    fn wire_document_decodes_base64() {
        let json = r#"{"base64":"JVBERi0=","blobId":"b1","documentType":"SRUT"}"#;
        let wire: WireDocument = serde_json::from_str(json).unwrap();
        let doc = wire.into_document("F9").unwrap();
        assert_eq!(doc.payload, b"%PDF-");
        assert_eq!(doc.document_type, "SRUT");
        assert_eq!(doc.source_identifier, "F9");
    }

    #[test]
    fn wire_document_rejects_bad_base64() {
        let wire = WireDocument {
            base64: "***".into(),
            blob_id: None,
            document_type: "E-NIK".into(),
        };
        assert!(matches!(wire.into_document("F"), Err(FetchError::Payload { .. })));
    }

    #[test]
    fn unquote_accepts_json_and_bare_strings() {
        assert_eq!(unquote("\"alice\"".into()), "alice");
        assert_eq!(unquote("bob".into()), "bob");
    }
}
