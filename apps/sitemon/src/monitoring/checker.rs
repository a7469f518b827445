use anyhow::Result;
use std::error::Error as StdError;
use std::io::ErrorKind;
use std::time::{Duration, Instant};
use tracing::info;

use super::types::{CheckResult, SiteConfig, now_millis};

/// Checks a single site.
///
/// Implementations never fail: every failure is captured in the returned
/// [`CheckResult`].
#[async_trait::async_trait]
pub trait Checker: Send + Sync {
    async fn check(&self, site: &SiteConfig) -> CheckResult;
}

/// HTTP/HTTPS checker issuing one GET per site
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).user_agent(user_agent).build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Checker for HttpChecker {
    async fn check(&self, site: &SiteConfig) -> CheckResult {
        let check_time = now_millis();
        let start = Instant::now();

        let result = match self.client.get(&site.url).send().await {
            Ok(response) => {
                let latency = start.elapsed().as_millis() as u64;
                CheckResult::from_response(site, check_time, response.status().as_u16(), latency)
            }
            Err(e) => CheckResult::from_error(site, check_time, error_code(&e)),
        };

        info!("{result}");
        result
    }
}

/// Map a transport error to a short conventional code, falling back to the
/// full message chain.
pub fn error_code(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        return "ETIMEDOUT".into();
    }

    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                ErrorKind::ConnectionRefused => return "ECONNREFUSED".into(),
                ErrorKind::ConnectionReset => return "ECONNRESET".into(),
                ErrorKind::ConnectionAborted => return "ECONNABORTED".into(),
                ErrorKind::TimedOut => return "ETIMEDOUT".into(),
                _ => {}
            }
        }
        let text = cause.to_string();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return "ENOTFOUND".into();
        }
        message.push_str(": ");
        message.push_str(&text);
        source = cause.source();
    }

    message
}
