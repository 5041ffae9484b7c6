//! The network seam.
//!
//! Everything that talks HTTP (catalog lookups, artifact
//! downloads, Forge mirror probing) goes through an
//! [`HttpTransport`], so tests can script responses
//! without a network.

use std::{collections::HashMap, path::Path, sync::Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::io::StreamReader;

use crate::{
    file_utils::{self, check_for_success, RequestError},
    DownloadFileError, IntoIoError, IntoJsonError, JsonDownloadError, CLIENT, NO_REDIRECT_CLIENT,
};

/// A fully-read HTTP response.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// The url that produced this response
    /// (after redirects, if they were followed).
    pub url: String,
    /// Header names are lowercase.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    #[must_use]
    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// # Errors
    /// [`RequestError::DownloadError`] if the status isn't 2xx.
    pub fn error_for_status(self) -> Result<Self, RequestError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RequestError::DownloadError {
                code: self.status,
                url: self.url,
            })
        }
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET, following redirects.
    async fn get(&self, url: &str) -> Result<HttpResponse, RequestError>;

    /// GET without following redirects.
    /// A 3xx comes back as-is with its `location` header.
    async fn get_no_redirect(&self, url: &str) -> Result<HttpResponse, RequestError>;

    /// Downloads `url` into `path`.
    ///
    /// The data goes to a temporary sibling first and is
    /// renamed into place once complete.
    async fn download_to_path(&self, url: &str, path: &Path) -> Result<(), DownloadFileError> {
        let response = self.get(url).await?.error_for_status()?;
        file_utils::write_atomic(path, &response.body).await?;
        Ok(())
    }
}

/// Fetches `url` and parses the body as JSON.
pub async fn get_json<T: serde::de::DeserializeOwned>(
    transport: &dyn HttpTransport,
    url: &str,
) -> Result<T, JsonDownloadError> {
    let response = transport.get(url).await?.error_for_status()?;
    let text = response.text();
    Ok(serde_json::from_str(&text).json(text)?)
}

/// The real transport, backed by the shared `reqwest` clients.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    no_redirect: reqwest::Client,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self {
            client: CLIENT.clone(),
            no_redirect: NO_REDIRECT_CLIENT.clone(),
        }
    }
}

impl ReqwestTransport {
    async fn fetch(client: &reqwest::Client, url: &str) -> Result<HttpResponse, RequestError> {
        let response = client.get(url).send().await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| Some((k.as_str().to_lowercase(), v.to_str().ok()?.to_owned())))
            .collect();
        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse {
            status,
            url: final_url,
            headers,
            body,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, RequestError> {
        Self::fetch(&self.client, url).await
    }

    async fn get_no_redirect(&self, url: &str) -> Result<HttpResponse, RequestError> {
        Self::fetch(&self.no_redirect, url).await
    }

    async fn download_to_path(&self, url: &str, path: &Path) -> Result<(), DownloadFileError> {
        let response = self.client.get(url).send().await?;
        check_for_success(&response)?;

        let stream = response
            .bytes_stream()
            .map(|n| n.map_err(std::io::Error::other));
        let mut stream = StreamReader::new(stream);

        if let Some(parent) = path.parent() {
            if !parent.is_dir() {
                tokio::fs::create_dir_all(&parent).await.path(parent)?;
            }
        }

        let temp = file_utils::temp_sibling(path);
        let mut file = tokio::fs::File::create(&temp).await.path(&temp)?;
        if let Err(err) = tokio::io::copy(&mut stream, &mut file).await {
            drop(file);
            _ = tokio::fs::remove_file(&temp).await;
            return Err(classify_copy_error(err, &temp));
        }
        drop(file);
        file_utils::rename_into_place(&temp, path).await?;
        Ok(())
    }
}

/// A failed copy is either the network stream breaking
/// (worth another mirror) or the disk refusing the write (not).
fn classify_copy_error(err: std::io::Error, temp: &Path) -> DownloadFileError {
    if err.get_ref().is_some_and(|e| e.is::<reqwest::Error>()) {
        let message = err.to_string();
        return match err.into_inner().map(|e| e.downcast::<reqwest::Error>()) {
            Some(Ok(e)) => DownloadFileError::Request(RequestError::ReqwestError(*e)),
            _ => DownloadFileError::Io(crate::IoError::Io {
                error: message,
                path: temp.to_owned(),
            }),
        };
    }
    err.path(temp).into()
}

/// A transport that answers from a fixed table of urls.
///
/// Unknown urls get a `404`. Every request is recorded,
/// which lets tests check what (and how much) was fetched.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: &str, response: HttpResponse) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.insert(url.to_owned(), response);
        }
    }

    /// Answers `url` with a `200` and `body`.
    pub fn ok(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.respond(
            url,
            HttpResponse {
                status: 200,
                url: url.to_owned(),
                headers: Vec::new(),
                body: body.into(),
            },
        );
    }

    /// Answers `url` with a redirect to `location`.
    pub fn redirect(&self, url: &str, location: &str) {
        self.respond(
            url,
            HttpResponse {
                status: 302,
                url: url.to_owned(),
                headers: vec![("location".to_owned(), location.to_owned())],
                body: Vec::new(),
            },
        );
    }

    /// Every url requested so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|n| n.clone()).unwrap_or_default()
    }

    #[must_use]
    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|n| n.len()).unwrap_or_default()
    }

    fn lookup(&self, url: &str) -> HttpResponse {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_owned());
        }
        self.routes
            .lock()
            .ok()
            .and_then(|routes| routes.get(url).cloned())
            .unwrap_or_else(|| HttpResponse {
                status: 404,
                url: url.to_owned(),
                headers: Vec::new(),
                body: b"Not Found".to_vec(),
            })
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, RequestError> {
        const MAX_HOPS: usize = 10;
        let mut response = self.lookup(url);
        for _ in 0..MAX_HOPS {
            if !response.is_redirect() {
                break;
            }
            let Some(location) = response.header("location").map(str::to_owned) else {
                break;
            };
            response = self.lookup(&location);
        }
        Ok(response)
    }

    async fn get_no_redirect(&self, url: &str) -> Result<HttpResponse, RequestError> {
        Ok(self.lookup(url))
    }
}

impl From<reqwest::Error> for DownloadFileError {
    fn from(value: reqwest::Error) -> Self {
        Self::Request(RequestError::ReqwestError(value))
    }
}

impl From<reqwest::Error> for JsonDownloadError {
    fn from(value: reqwest::Error) -> Self {
        Self::RequestError(RequestError::ReqwestError(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_transport_follows_redirects_only_when_asked() {
        let transport = ScriptedTransport::new();
        transport.redirect("https://a.test/x", "https://b.test/x");
        transport.ok("https://b.test/x", "hello");

        let followed = transport.get("https://a.test/x").await.unwrap();
        assert_eq!(followed.text(), "hello");

        let raw = transport.get_no_redirect("https://a.test/x").await.unwrap();
        assert!(raw.is_redirect());
        assert_eq!(raw.header("Location"), Some("https://b.test/x"));

        assert_eq!(transport.get("https://c.test").await.unwrap().status, 404);
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test]
    async fn default_download_writes_the_body() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new();
        transport.ok("https://a.test/file.jar", vec![1u8, 2, 3]);

        let path = dir.path().join("libs/file.jar");
        transport
            .download_to_path("https://a.test/file.jar", &path)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), [1, 2, 3]);

        let missing = transport
            .download_to_path("https://a.test/missing.jar", &dir.path().join("m.jar"))
            .await;
        assert!(matches!(
            missing,
            Err(DownloadFileError::Request(RequestError::DownloadError { code: 404, .. }))
        ));
    }
}
