// src/crawl/fetch.rs
// =============================================================================
// Fetching pages.
//
// The driver never talks to reqwest directly. It asks a Fetcher for a page,
// which means tests can hand it a fake website held in a HashMap.
//
// HttpFetcher is the real one:
// - One shared reqwest Client (connection pooling, timeout, user agent)
// - A small delay before each request, so we don't hammer the site
// - Redirects are followed only while they stay on the allowed domains
// - Only 2xx HTML responses count as pages; everything else is a FetchError
//
// Page.url is the URL we ended up on after redirects. Relative links on the
// page must be resolved against it, not against the URL we asked for.
// =============================================================================

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::{Attempt, Policy};
use reqwest::{Client, Response};
use tracing::debug;
use url::Url;

use super::frontier::host_allowed;
use crate::config::FetchSettings;
use crate::error::FetchError;

const MAX_REDIRECTS: usize = 5;

/// A successfully fetched HTML page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// The final URL, after any redirects
    pub url: String,
    /// HTTP status code of the final response
    pub status: u16,
    pub html: String,
}

/// Anything that can turn a URL into page content.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError>;
}

/// Fetches pages over HTTP(S) with reqwest.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    settings: FetchSettings,
    allowed_domains: Vec<String>,
}

impl HttpFetcher {
    pub fn new(settings: FetchSettings, allowed_domains: Vec<String>) -> Result<Self, FetchError> {
        let policy_domains = allowed_domains.clone();
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .redirect(Policy::custom(move |attempt| {
                redirect_action(attempt, &policy_domains)
            }))
            .build()?;

        Ok(Self {
            client,
            settings,
            allowed_domains,
        })
    }
}

// Follows on-list redirects; an off-list hop stops the chain so the 3xx
// response itself comes back and fetch() can report it as Disallowed.
fn redirect_action(attempt: Attempt<'_>, allowed_domains: &[String]) -> reqwest::redirect::Action {
    if attempt.previous().len() >= MAX_REDIRECTS {
        return attempt.error("too many redirects");
    }
    if ensure_allowed(attempt.url(), allowed_domains).is_ok() {
        attempt.follow()
    } else {
        attempt.stop()
    }
}

/// Fails with FetchError::Disallowed when the URL's host is off the list.
pub fn ensure_allowed(url: &Url, allowed_domains: &[String]) -> Result<(), FetchError> {
    match url.host_str() {
        Some(host) if host_allowed(host, allowed_domains) => Ok(()),
        Some(host) => Err(FetchError::Disallowed(host.to_string())),
        None => Err(FetchError::Disallowed(url.to_string())),
    }
}

// Where a 3xx response points to, resolved against the response URL
fn redirect_target(response: &Response) -> Option<Url> {
    let location = response.headers().get(LOCATION)?.to_str().ok()?;
    response.url().join(location).ok()
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Page, FetchError> {
        // Polite crawling: small delay before every request
        if !self.settings.request_delay.is_zero() {
            tokio::time::sleep(self.settings.request_delay).await;
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        debug!(url, final_url = %response.url(), status = status.as_u16(), "fetched");

        // The redirect policy stopped on an off-list hop
        if status.is_redirection() {
            if let Some(target) = redirect_target(&response) {
                ensure_allowed(&target, &self.allowed_domains)?;
            }
        }
        ensure_allowed(response.url(), &self.allowed_domains)?;

        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !is_html(&content_type) {
            return Err(FetchError::NotHtml(content_type));
        }

        let final_url = response.url().to_string();
        let html = response.text().await?;
        Ok(Page {
            url: final_url,
            status: status.as_u16(),
            html,
        })
    }
}

// A missing content-type is given the benefit of the doubt
fn is_html(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.is_empty()
        || content_type.starts_with("text/html")
        || content_type.starts_with("application/xhtml+xml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    // Tiny HTTP server: /list redirects on-site, /away redirects off-site,
    // everything else is a small HTML page.
    async fn serve(listener: TcpListener) {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = socket.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("/");

                let response = match path {
                    "/list" => "HTTP/1.1 301 Moved Permanently\r\nLocation: /c/list/\r\n\
                                Content-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_string(),
                    "/away" => "HTTP/1.1 302 Found\r\nLocation: http://tracker.example/\r\n\
                                Content-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_string(),
                    _ => {
                        let body = "<html><body><a href=\"item\">item</a></body></html>";
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\
                             Content-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    }
                };
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    }

    fn local_fetcher() -> HttpFetcher {
        HttpFetcher::new(
            FetchSettings {
                timeout: Duration::from_secs(5),
                request_delay: Duration::ZERO,
                user_agent: "rule-crawler-test".to_string(),
            },
            vec!["127.0.0.1".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_is_html() {
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("Application/XHTML+XML"));
        assert!(is_html(""));
        assert!(!is_html("application/pdf"));
        assert!(!is_html("image/png"));
    }

    #[test]
    fn test_http_fetcher_builds() {
        let fetcher = HttpFetcher::new(
            FetchSettings {
                timeout: Duration::from_secs(5),
                request_delay: Duration::ZERO,
                user_agent: "rule-crawler-test".to_string(),
            },
            vec!["x.com".to_string()],
        );
        assert!(fetcher.is_ok());
    }

    #[test]
    fn test_ensure_allowed_rejects_off_list_redirect_target() {
        let domains = vec!["x.com".to_string()];

        let same_site = Url::parse("http://www.x.com/c/list/").unwrap();
        assert!(ensure_allowed(&same_site, &domains).is_ok());

        let elsewhere = Url::parse("https://tracker.example/landing").unwrap();
        match ensure_allowed(&elsewhere, &domains) {
            Err(FetchError::Disallowed(host)) => assert_eq!(host, "tracker.example"),
            other => panic!("expected disallowed host, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_follows_on_site_redirect_and_reports_final_url() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));

        let page = local_fetcher()
            .fetch(&format!("http://{addr}/list"))
            .await
            .unwrap();
        assert_eq!(page.url, format!("http://{addr}/c/list/"));
        assert_eq!(page.status, 200);
        assert!(page.html.contains("item"));
    }

    #[tokio::test]
    async fn test_fetch_refuses_off_site_redirect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve(listener));

        match local_fetcher().fetch(&format!("http://{addr}/away")).await {
            Err(FetchError::Disallowed(host)) => assert_eq!(host, "tracker.example"),
            other => panic!("expected disallowed redirect, got {other:?}"),
        }
    }
}
