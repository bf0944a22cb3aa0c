use crate::error::Nh5Error;
use crate::range_source::{self, RangeSource};

use bytes::Bytes;
use url::Url;

/// Credentials attached to every HTTP range request.
#[derive(Clone, Eq, Hash, PartialEq)]
pub enum HttpCredentials {
    /// HTTP basic authentication.
    Basic { username: String, password: String },
    /// Bearer token authentication.
    Bearer { token: String },
    None,
}

impl HttpCredentials {
    /// Create a basic authentication credential.
    pub fn basic(username: &str, password: &str) -> Self {
        HttpCredentials::Basic {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Create a bearer token credential.
    pub fn bearer(token: &str) -> Self {
        HttpCredentials::Bearer {
            token: token.to_string(),
        }
    }
}

// Keep secrets out of logs and instrumented spans.
impl std::fmt::Debug for HttpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("token", &"<redacted>")
                .finish(),
            Self::None => write!(f, "None"),
        }
    }
}

/// HTTP range downloader.
///
/// Implements [RangeSource] for a container served over HTTP(S).
#[derive(Debug)]
pub struct HttpRangeDownloader {
    reqwest_client: reqwest::Client,
    url: Url,
    credentials: HttpCredentials,
}

impl HttpRangeDownloader {
    /// Create a new HTTP range downloader.
    ///
    /// # Arguments
    ///
    /// * `url`: URL of the container
    /// * `credentials`: Credentials attached to each request
    pub fn new(url: Url, credentials: HttpCredentials) -> Self {
        Self {
            reqwest_client: reqwest::Client::new(),
            url,
            credentials,
        }
    }

    /// URL of the container.
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl RangeSource for HttpRangeDownloader {
    /// Download the requested byte range.
    ///
    /// Returns bytes.
    ///
    /// # Arguments
    ///
    /// * `start`: Offset of the first byte
    /// * `end`: Offset of the last byte (inclusive)
    #[tracing::instrument(level = "DEBUG", skip(self), fields(url = %self.url))]
    async fn get_range(&self, start: u64, end: u64) -> Result<Bytes, Nh5Error> {
        // Prepare an authenticated GET request
        let request = self.reqwest_client.get(self.url.as_str());
        let request = match &self.credentials {
            HttpCredentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            HttpCredentials::Bearer { token } => request.bearer_auth(token),
            HttpCredentials::None => request,
        };
        let request = request.header(
            reqwest::header::RANGE,
            range_source::range_header(start, end),
        );
        // Send the request
        let response = request.send().await?;
        let full_content = match response.status() {
            reqwest::StatusCode::PARTIAL_CONTENT => false,
            reqwest::StatusCode::OK => true,
            status => {
                return Err(Nh5Error::HttpRequest {
                    url: self.url.to_string(),
                    status: status.as_u16(),
                })
            }
        };
        let body = response.bytes().await?;
        // A server that ignores the Range header returns the whole resource.
        let body = if full_content {
            tracing::debug!("server ignored range request, slicing locally");
            let len = body.len() as u64;
            let start = start.min(len).try_into()?;
            let end: usize = end.saturating_add(1).min(len).try_into()?;
            body.slice(start..end)
        } else {
            body
        };
        // The data returned by the client does not have any alignment guarantees.
        // In order to reinterpret the data as an array of numbers with a higher alignment than 1,
        // we need to return the data in Bytes object in which the underlying data has a higher alignment.
        // Create an 8-byte aligned Vec<u8>, enough for the widest dtype.
        let mut buf = maligned::align_first::<u8, maligned::A8>(body.len());
        buf.extend_from_slice(&body);
        // Return as Bytes.
        Ok(buf.into())
    }
}
