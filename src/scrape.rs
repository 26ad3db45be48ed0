//! Server-side page scraping
//!
//! Fetches a URL and reduces the page to its visible text:
//! - SSRF prevention (blocking private IP ranges and non-HTTP schemes)
//! - Size limits and timeouts
//! - Rate limiting
//! - HTML parsing with `scraper`: `<script>`/`<style>` text dropped, `<body>`
//!   text kept, whitespace collapsed

use crate::config::ServerConfig;
use crate::error::{ChatResult, ChatlineError};
use scraper::{ElementRef, Html, Selector};
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex;
use url::Url;

/// Elements whose text is never part of the visible page
const HIDDEN_ELEMENTS: &[&str] = &["script", "style"];

/// SSRF (Server-Side Request Forgery) prevention validator
///
/// Rejects non-HTTP schemes and, unless configured otherwise, literal
/// loopback, private, link-local and unspecified addresses.
#[derive(Debug, Clone, Default)]
pub struct SsrfValidator {
    allow_private_ips: bool,
}

impl SsrfValidator {
    /// Create a validator that blocks private targets
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a validator that allows private targets (tests, local use)
    pub fn allow_private_ips() -> Self {
        Self {
            allow_private_ips: true,
        }
    }

    /// Validate a URL and return it parsed
    ///
    /// # Errors
    ///
    /// Returns `ChatlineError::Scrape` if the URL is invalid or targets a
    /// blocked address
    pub fn validate(&self, url: &str) -> ChatResult<Url> {
        let parsed = Url::parse(url).map_err(|e| ChatlineError::Scrape(format!("Invalid URL: {}", e)))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ChatlineError::Scrape(format!(
                    "Unsupported URL scheme: {}",
                    other
                )))
            }
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| ChatlineError::Scrape("URL has no host".to_string()))?;
        self.validate_host(host)?;

        Ok(parsed)
    }

    fn validate_host(&self, host: &str) -> ChatResult<()> {
        if self.allow_private_ips {
            return Ok(());
        }

        let lowered = host.to_ascii_lowercase();
        if lowered == "localhost" || lowered.ends_with(".localhost") {
            return Err(ChatlineError::Scrape(
                "Requests to localhost are not allowed".to_string(),
            ));
        }

        let bare = host.trim_start_matches('[').trim_end_matches(']');
        match IpAddr::from_str(bare) {
            Ok(ip) => self.validate_ip(ip),
            Err(_) => Ok(()),
        }
    }

    fn validate_ip(&self, ip: IpAddr) -> ChatResult<()> {
        let blocked = match ip {
            IpAddr::V4(v4) => {
                v4.is_loopback()
                    || v4.is_private()
                    || v4.is_link_local()
                    || v4.is_unspecified()
                    || v4.is_broadcast()
                    || v4.octets()[0] == 0
            }
            IpAddr::V6(v6) => {
                let first = v6.segments()[0];
                v6.is_loopback()
                    || v6.is_unspecified()
                    // fc00::/7 unique local
                    || (first & 0xfe00) == 0xfc00
                    // fe80::/10 link-local
                    || (first & 0xffc0) == 0xfe80
                    || v6
                        .to_ipv4_mapped()
                        .map(|v4| self.validate_ip(IpAddr::V4(v4)).is_err())
                        .unwrap_or(false)
            }
        };

        if blocked {
            return Err(ChatlineError::Scrape(format!(
                "Requests to private address {} are not allowed",
                ip
            )));
        }
        Ok(())
    }
}

/// Sliding-window rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_requests_per_minute: u32,
    requests: Vec<SystemTime>,
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests_per_minute` requests
    pub fn new(max_requests_per_minute: u32) -> Self {
        Self {
            max_requests_per_minute,
            requests: Vec::new(),
        }
    }

    /// Record a request if the limit allows it
    ///
    /// # Errors
    ///
    /// Returns `ChatlineError::RateLimitExceeded` when the window is full
    pub fn check_and_record(&mut self) -> ChatResult<()> {
        let now = SystemTime::now();
        let one_minute_ago = now.checked_sub(Duration::from_secs(60)).unwrap_or(now);
        self.requests.retain(|&t| t > one_minute_ago);

        if self.requests.len() >= self.max_requests_per_minute as usize {
            return Err(ChatlineError::RateLimitExceeded {
                limit: self.max_requests_per_minute,
                message: "scrape requests per minute".to_string(),
            });
        }

        self.requests.push(now);
        Ok(())
    }
}

/// Fetches pages and extracts their visible text
#[derive(Clone)]
pub struct Scraper {
    client: reqwest::Client,
    ssrf_validator: SsrfValidator,
    timeout: Duration,
    max_size_bytes: usize,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl Scraper {
    /// Create a scraper
    ///
    /// # Arguments
    ///
    /// * `timeout` - Timeout for the page request
    /// * `max_size_bytes` - Bytes read from the body before truncating
    /// * `requests_per_minute` - Rate limit across all callers
    /// * `ssrf_validator` - Target validation policy
    ///
    /// # Errors
    ///
    /// Returns `ChatlineError::Config` if the HTTP client fails to build
    pub fn new(
        timeout: Duration,
        max_size_bytes: usize,
        requests_per_minute: u32,
        ssrf_validator: SsrfValidator,
    ) -> ChatResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("chatline/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatlineError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            ssrf_validator,
            timeout,
            max_size_bytes,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(requests_per_minute))),
        })
    }

    /// Create a scraper from the server configuration
    pub fn from_config(config: &ServerConfig) -> ChatResult<Self> {
        let validator = if config.allow_private_ips {
            SsrfValidator::allow_private_ips()
        } else {
            SsrfValidator::new()
        };
        Self::new(
            Duration::from_secs(config.scrape_timeout_seconds),
            config.scrape_max_bytes,
            config.scrape_requests_per_minute,
            validator,
        )
    }

    /// Fetch a URL and return its visible text
    ///
    /// # Errors
    ///
    /// - `ChatlineError::RateLimitExceeded` if the rate limit is hit
    /// - `ChatlineError::Scrape` for blocked or invalid URLs, transport
    ///   failures, non-2xx statuses, binary bodies and pages with no text
    pub async fn scrape(&self, url: &str) -> ChatResult<String> {
        self.rate_limiter.lock().await.check_and_record()?;
        let parsed = self.ssrf_validator.validate(url)?;

        tracing::debug!("Scraping {}", parsed);
        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| ChatlineError::Scrape(format!("Failed to fetch URL: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChatlineError::Scrape(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ChatlineError::Scrape(format!("Failed to read response body: {}", e)))?
        {
            let remaining = self.max_size_bytes - body.len();
            if chunk.len() >= remaining {
                body.extend_from_slice(&chunk[..remaining]);
                tracing::debug!("Truncated {} at {} bytes", url, self.max_size_bytes);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        if body.contains(&0) {
            return Err(ChatlineError::Scrape(
                "Binary content cannot be scraped".to_string(),
            ));
        }

        let text = html_to_text(&String::from_utf8_lossy(&body));
        if text.is_empty() {
            return Err(ChatlineError::Scrape("Page has no text content".to_string()));
        }

        tracing::info!("Scraped {} ({} chars)", url, text.chars().count());
        Ok(text)
    }
}

impl std::fmt::Debug for Scraper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scraper")
            .field("ssrf_validator", &self.ssrf_validator)
            .field("timeout", &self.timeout)
            .field("max_size_bytes", &self.max_size_bytes)
            .finish()
    }
}

/// Reduce an HTML document to its visible text
///
/// `<script>` and `<style>` contents are dropped, the text nodes of `<body>`
/// are concatenated in document order (entities decoded by the parser), and
/// whitespace runs collapse to single spaces.
///
/// # Examples
///
/// ```
/// use chatline::scrape::html_to_text;
///
/// let html = "<html><head><style>p{}</style></head>\
///             <body><p>Hello&nbsp;<b>world</b></p><script>x()</script></body></html>";
/// assert_eq!(html_to_text(html), "Hello world");
/// ```
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());

    let raw = visible_text(root);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn visible_text(root: ElementRef<'_>) -> String {
    let mut text = String::new();
    for node in root.descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            text.push_str(fragment);
        }
    }
    text
}
