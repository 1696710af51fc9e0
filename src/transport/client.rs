//! Production HTTP client implementation using reqwest.

use std::time::Duration;

use super::{HttpClient, HttpError, HttpRequest, HttpResponse};

/// Production HTTP client using reqwest.
///
/// A thin wrapper around `reqwest::Client` that implements [`HttpClient`].
///
/// # Example
///
/// ```no_run
/// use wan_dyndns::transport::{HttpClient, HttpRequest, ReqwestClient};
/// use url::Url;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ReqwestClient::new();
/// let url = Url::parse("https://api.example.com/status")?;
/// let response = client.request(HttpRequest::get(url)).await?;
/// println!("Status: {}", response.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Per-request timeout applied by [`ReqwestClient::builder`].
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a new HTTP client with reqwest's default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: reqwest::Client::new(),
        }
    }

    /// Creates an HTTP client from an existing reqwest client.
    #[must_use]
    pub const fn from_client(client: reqwest::Client) -> Self {
        Self { inner: client }
    }

    /// Starts a configurable client.
    #[must_use]
    pub const fn builder() -> ClientOptions {
        ClientOptions {
            timeout: Self::DEFAULT_TIMEOUT,
            verify_tls: true,
            root_ca_pem: None,
        }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for building a [`ReqwestClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    timeout: Duration,
    verify_tls: bool,
    root_ca_pem: Option<Vec<u8>>,
}

impl ClientOptions {
    /// Sets the per-request timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables or disables TLS certificate verification.
    #[must_use]
    pub const fn verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Trusts an additional PEM-encoded CA certificate.
    #[must_use]
    pub fn root_ca_pem(mut self, pem: Vec<u8>) -> Self {
        self.root_ca_pem = Some(pem);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`HttpError::Setup`] if the CA certificate cannot be parsed
    /// or the TLS backend fails to initialize.
    pub fn build(self) -> Result<ReqwestClient, HttpError> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .danger_accept_invalid_certs(!self.verify_tls);

        if let Some(pem) = &self.root_ca_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| HttpError::Setup(format!("invalid CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let inner = builder
            .build()
            .map_err(|e| HttpError::Setup(e.to_string()))?;
        Ok(ReqwestClient::from_client(inner))
    }
}

impl HttpClient for ReqwestClient {
    async fn request(&self, req: HttpRequest) -> Result<HttpResponse, HttpError> {
        let mut builder = self.inner.request(req.method, req.url.as_str());

        for (name, value) in &req.headers {
            builder = builder.header(name, value);
        }

        if let Some(auth) = &req.basic_auth {
            builder = builder.basic_auth(&auth.username, Some(&auth.password));
        }

        if let Some(body) = req.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout
            } else if e.is_builder() {
                HttpError::InvalidUrl(e.to_string())
            } else {
                HttpError::Connection(Box::new(e))
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    HttpError::Timeout
                } else {
                    HttpError::Connection(Box::new(e))
                }
            })?
            .to_vec();

        Ok(HttpResponse::new(status, headers, body))
    }
}
