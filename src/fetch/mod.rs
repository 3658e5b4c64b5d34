//! Fetch collaborator interface and default HTTP implementation
//!
//! The pipeline treats page fetching as an external collaborator behind the
//! [`PageFetcher`] trait; [`HttpFetcher`] is the reqwest-backed default. All
//! fetch and extraction failures share one [`FailureKind`] taxonomy so the
//! retry policy can classify them uniformly.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Coarse classification of a fetch or extraction failure
///
/// The retry policy's transient/permanent predicate operates over this kind;
/// see [`FailureKind::is_transient`] for the default rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Request or read timed out
    Timeout,

    /// Connection refused, DNS failure, TLS failure
    Connect,

    /// HTTP 429 or an explicit rate-limit response from the service
    RateLimited,

    /// Upstream service error (HTTP 5xx or service-reported internal error)
    ServiceError,

    /// Model output that could not be parsed into records
    MalformedOutput,

    /// Any other HTTP status treated at face value
    HttpStatus(u16),

    /// URL could not be parsed or is structurally unusable
    MalformedUrl,

    /// Credentials rejected (HTTP 401/403)
    Unauthorized,
}

impl FailureKind {
    /// Default transient/permanent classification
    ///
    /// Transient failures are expected to resolve on retry: timeouts,
    /// connection drops, rate limiting, service errors, and malformed model
    /// output (LLM output is nondeterministic, so a retry can fix it).
    /// Permanent failures get exactly one attempt: malformed URLs, rejected
    /// credentials, and non-429 4xx statuses.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout
            | Self::Connect
            | Self::RateLimited
            | Self::ServiceError
            | Self::MalformedOutput => true,
            Self::HttpStatus(code) => *code >= 500,
            Self::MalformedUrl | Self::Unauthorized => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::RateLimited => "rate_limited",
            Self::ServiceError => "service_error",
            Self::MalformedOutput => "malformed_output",
            Self::HttpStatus(_) => "http_status",
            Self::MalformedUrl => "malformed_url",
            Self::Unauthorized => "unauthorized",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpStatus(code) => write!(f, "http_status({})", code),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// A failed fetch attempt
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

/// Fetched page content handed to the extraction collaborator
#[derive(Debug, Clone)]
pub struct PageContent {
    pub url: Url,
    pub html: String,
}

/// Fetch collaborator interface
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<PageContent, FetchFailure>;
}

/// Default reqwest-backed fetcher
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds the fetcher with sane crawl timeouts
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("pagemill/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self { client })
    }

    /// Wraps an existing client (tests point this at a mock server)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<PageContent, FetchFailure> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status));
        }

        let html = response.text().await.map_err(classify_reqwest_error)?;

        Ok(PageContent {
            url: url.clone(),
            html,
        })
    }
}

/// Maps a reqwest error onto the failure taxonomy
fn classify_reqwest_error(e: reqwest::Error) -> FetchFailure {
    let kind = if e.is_timeout() {
        FailureKind::Timeout
    } else if e.is_connect() {
        FailureKind::Connect
    } else if e.is_builder() || e.is_request() {
        FailureKind::MalformedUrl
    } else {
        FailureKind::ServiceError
    };

    FetchFailure::new(kind, e.to_string())
}

/// Maps a non-success HTTP status onto the failure taxonomy
fn classify_status(status: StatusCode) -> FetchFailure {
    let kind = match status {
        StatusCode::TOO_MANY_REQUESTS => FailureKind::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FailureKind::Unauthorized,
        s if s.is_server_error() => FailureKind::ServiceError,
        s => FailureKind::HttpStatus(s.as_u16()),
    };

    FetchFailure::new(kind, format!("HTTP {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_transient_classification() {
        assert!(FailureKind::Timeout.is_transient());
        assert!(FailureKind::Connect.is_transient());
        assert!(FailureKind::RateLimited.is_transient());
        assert!(FailureKind::ServiceError.is_transient());
        assert!(FailureKind::MalformedOutput.is_transient());
        assert!(FailureKind::HttpStatus(503).is_transient());
    }

    #[test]
    fn test_permanent_classification() {
        assert!(!FailureKind::MalformedUrl.is_transient());
        assert!(!FailureKind::Unauthorized.is_transient());
        assert!(!FailureKind::HttpStatus(404).is_transient());
        assert!(!FailureKind::HttpStatus(410).is_transient());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hotel"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>Отель</html>"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = Url::parse(&format!("{}/hotel", server.uri())).unwrap();

        let page = fetcher.fetch(&url).await.unwrap();
        assert!(page.html.contains("Отель"));
        assert_eq!(page.url, url);
    }

    #[tokio::test]
    async fn test_fetch_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = Url::parse(&server.uri()).unwrap();

        let failure = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::RateLimited);
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = Url::parse(&server.uri()).unwrap();

        let failure = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::HttpStatus(404));
        assert!(!failure.kind.is_transient());
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new().unwrap();
        let url = Url::parse(&server.uri()).unwrap();

        let failure = fetcher.fetch(&url).await.unwrap_err();
        assert_eq!(failure.kind, FailureKind::ServiceError);
        assert!(failure.kind.is_transient());
    }
}
