//! Web page text extraction for URL attachments

use crate::config::FetchConfig;
use crate::llm::{HttpRequest, HttpTransport};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script[^>]*>.*?</script>").expect("valid script regex"));
static STYLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style[^>]*>.*?</style>").expect("valid style regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));
static SPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid space regex"));

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid URL '{0}': only http(s) URLs can be fetched")]
    InvalidUrl(String),

    #[error("Failed to fetch {url}: {message}")]
    Transport { url: String, message: String },
}

/// Visible text of an HTML document, cut to `max_chars` characters
///
/// Drops scripts and styles, replaces tags with spaces, collapses whitespace.
pub fn extract_text(html: &str, max_chars: usize) -> String {
    let text = SCRIPT_RE.replace_all(html, "");
    let text = STYLE_RE.replace_all(&text, "");
    let text = TAG_RE.replace_all(&text, " ");
    let text = SPACE_RE.replace_all(&text, " ");
    text.trim().chars().take(max_chars).collect()
}

/// Fetch a page and return its extracted text
///
/// The body is used whatever the status code, so error pages come back as text.
pub async fn fetch_url_text(
    transport: &dyn HttpTransport,
    url: &str,
    settings: &FetchConfig,
) -> Result<String, FetchError> {
    let url = url.trim();
    match reqwest::Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => return Err(FetchError::InvalidUrl(url.to_string())),
    }

    let request = HttpRequest::get(url).with_header("User-Agent", &settings.user_agent);
    let response = transport
        .send(request)
        .await
        .map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

    if !response.is_success() {
        tracing::warn!("{} answered HTTP {}", url, response.status);
    }

    Ok(extract_text(&response.body, settings.max_chars))
}
