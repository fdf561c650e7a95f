//! Azure Blob Storage REST adapter.
//!
//! Requests are authorised by the SAS query string carried on the container
//! URL, e.g. `https://account.blob.core.windows.net/$web?sv=...&sig=...`.

use super::{BlobPage, BlobStore, PublicAccess};
use crate::errors::{Result, SyncError};
use crate::record::BlobDescriptor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use std::time::Duration;
use tracing::debug;
use url::Url;

const API_VERSION: &str = "2023-11-03";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Blob container addressed through the Blob service REST API.
pub struct AzureBlobStore {
    client: Client,
    container_url: Url,
}

impl AzureBlobStore {
    /// Build a store from a (typically SAS-signed) container URL.
    pub fn from_container_url(container_url: &str) -> Result<Self> {
        let url = Url::parse(container_url).map_err(|e| {
            SyncError::Configuration(format!("invalid container url: {e}"))
        })?;
        let has_container = url
            .path_segments()
            .and_then(|mut s| s.next())
            .is_some_and(|s| !s.is_empty());
        if !has_container {
            return Err(SyncError::Configuration(
                "container url must name a container in its path".into(),
            ));
        }
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            client,
            container_url: url,
        })
    }

    /// Container name taken from the URL path.
    pub fn container_name(&self) -> &str {
        self.container_url
            .path_segments()
            .and_then(|mut s| s.next())
            .unwrap_or_default()
    }

    fn container_op(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.container_url.clone();
        url.query_pairs_mut().extend_pairs(params);
        url
    }

    fn blob_url(&self, path: &str) -> Url {
        let mut url = self.container_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(path.split('/'));
        }
        url
    }

    fn service_op(&self, params: &[(&str, &str)]) -> Url {
        let mut url = self.container_url.clone();
        url.set_path("/");
        url.query_pairs_mut().extend_pairs(params);
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("x-ms-version", API_VERSION)
    }

    async fn send(&self, what: &str, req: RequestBuilder) -> Result<reqwest::Response> {
        let resp = req
            .send()
            .await
            .map_err(|e| SyncError::Storage(format!("{what}: {e}")))?;
        let status = resp.status();
        debug!(operation = what, %status, "storage response");
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(SyncError::Storage(format!(
            "{what}: status {status}: {}",
            error_code(&body).unwrap_or("unknown error")
        )))
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn list_page(&self, prefix: &str, marker: Option<&str>) -> Result<BlobPage> {
        let mut params = vec![("restype", "container"), ("comp", "list")];
        if !prefix.is_empty() {
            params.push(("prefix", prefix));
        }
        if let Some(marker) = marker {
            params.push(("marker", marker));
        }
        let url = self.container_op(&params);
        let resp = self.send("list blobs", self.request(Method::GET, url)).await?;
        let body = resp
            .text()
            .await
            .map_err(|e| SyncError::Storage(format!("list blobs: {e}")))?;
        parse_list_response(&body)
    }

    async fn container_exists(&self) -> Result<bool> {
        let url = self.container_op(&[("restype", "container")]);
        let resp = self
            .request(Method::HEAD, url)
            .send()
            .await
            .map_err(|e| SyncError::Storage(format!("container properties: {e}")))?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(SyncError::Storage(format!(
                "container properties: status {s}"
            ))),
        }
    }

    async fn create_container(&self, access: PublicAccess) -> Result<()> {
        let url = self.container_op(&[("restype", "container")]);
        let mut req = self.request(Method::PUT, url);
        if let Some(level) = access.header_value() {
            req = req.header("x-ms-blob-public-access", level);
        }
        self.send("create container", req).await?;
        Ok(())
    }

    async fn set_access_policy(&self, access: PublicAccess) -> Result<()> {
        let url = self.container_op(&[("restype", "container"), ("comp", "acl")]);
        let mut req = self
            .request(Method::PUT, url)
            .header("Content-Type", "application/xml")
            .body(r#"<?xml version="1.0" encoding="utf-8"?><SignedIdentifiers />"#);
        if let Some(level) = access.header_value() {
            req = req.header("x-ms-blob-public-access", level);
        }
        self.send("set container acl", req).await?;
        Ok(())
    }

    async fn upload(&self, path: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.blob_url(path);
        let req = self
            .request(Method::PUT, url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("x-ms-blob-content-type", content_type)
            .header("Content-Type", content_type)
            .body(body);
        self.send("put blob", req).await?;
        Ok(())
    }

    async fn enable_static_website(
        &self,
        index_document: &str,
        error_document: &str,
    ) -> Result<()> {
        let url = self.service_op(&[("restype", "service"), ("comp", "properties")]);
        let body = format!(
            concat!(
                r#"<?xml version="1.0" encoding="utf-8"?>"#,
                "<StorageServiceProperties><StaticWebsite>",
                "<Enabled>true</Enabled>",
                "<IndexDocument>{}</IndexDocument>",
                "<ErrorDocument404Path>{}</ErrorDocument404Path>",
                "</StaticWebsite></StorageServiceProperties>"
            ),
            quick_xml::escape::escape(index_document),
            quick_xml::escape::escape(error_document),
        );
        let req = self
            .request(Method::PUT, url)
            .header("Content-Type", "application/xml")
            .body(body);
        self.send("set service properties", req).await?;
        Ok(())
    }
}

/// Parse a `List Blobs` XML response.
pub fn parse_list_response(xml: &str) -> Result<BlobPage> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut page = BlobPage::default();
    let mut in_blob = false;
    let mut current_tag = String::new();
    let mut name = String::new();
    let mut last_modified: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if tag == "Blob" {
                    in_blob = true;
                    name.clear();
                    last_modified = None;
                }
                current_tag = tag;
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| SyncError::Storage(format!("list blobs xml: {err}")))?
                    .to_string();
                match current_tag.as_str() {
                    "Name" if in_blob => name = text,
                    "Last-Modified" if in_blob => last_modified = Some(text),
                    "NextMarker" => page.next_marker = Some(text),
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"Blob" && in_blob {
                    let ts = last_modified.as_deref().ok_or_else(|| {
                        SyncError::Storage(format!("blob {name:?} has no Last-Modified"))
                    })?;
                    page.blobs
                        .push(BlobDescriptor::new(name.clone(), parse_http_date(ts)?));
                    in_blob = false;
                }
                current_tag.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SyncError::Storage(format!("list blobs xml: {e}"))),
            _ => {}
        }
    }

    Ok(page)
}

fn parse_http_date(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SyncError::Storage(format!("bad Last-Modified {value:?}: {e}")))
}

/// `<Code>` element of a storage error body.
fn error_code(body: &str) -> Option<&str> {
    let start = body.find("<Code>")? + "<Code>".len();
    let end = body[start..].find("</Code>")? + start;
    Some(&body[start..end])
}
