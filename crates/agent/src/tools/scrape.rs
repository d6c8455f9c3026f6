use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::USER_AGENT;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;

use switchboard_core::config::SearchConfig;

use super::{Tool, ToolError};

const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Safari/537.36";
const SCRAPE_TIMEOUT: Duration = Duration::from_secs(20);

pub fn tools(http: reqwest::Client, search: &SearchConfig) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(WebScrape::new(http.clone())),
        Arc::new(GoogleSearch::new(http, search)),
    ]
}

#[derive(Debug, Deserialize)]
struct WebScrapeArgs {
    url: String,
    #[serde(default)]
    ignore_links: bool,
    #[serde(default)]
    max_length: Option<usize>,
}

/// Fetches a page and returns its readable text.
pub struct WebScrape {
    http: reqwest::Client,
}

impl WebScrape {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn fetch(&self, args: &WebScrapeArgs) -> Result<String, ToolError> {
        let url = reqwest::Url::parse(&args.url)
            .map_err(|e| ToolError::InvalidArguments(format!("invalid url: {e}")))?;
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .timeout(SCRAPE_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Ok(format!("Failed to fetch the URL. Status code: {}", status.as_u16()));
        }

        let body = response.text().await?;
        let mut text = html_to_text(&body, args.ignore_links);
        if let Some(max_length) = args.max_length {
            text = truncate_chars(&text, max_length);
        }
        Ok(text)
    }
}

#[async_trait]
impl Tool for WebScrape {
    fn name(&self) -> &'static str {
        "webscrape"
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: WebScrapeArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        match self.fetch(&args).await {
            Ok(text) => Ok(text),
            Err(error) => {
                tracing::warn!(
                    event_name = "tool.webscrape_failed",
                    url = %args.url,
                    error = %error,
                    "webscrape failed"
                );
                Ok(format!("Error fetching the URL {}", args.url))
            }
        }
    }
}

/// Converts markup to plain text after dropping executable and styling elements.
pub fn html_to_text(html: &str, ignore_links: bool) -> String {
    let mut cleaned = match stripped_elements() {
        Some(re) => re.replace_all(html, "").into_owned(),
        None => html.to_string(),
    };
    if ignore_links {
        if let Some(re) = link_targets() {
            cleaned = re.replace_all(&cleaned, "$tag").into_owned();
        }
    }
    nanohtml2text::html2text(&cleaned).trim().to_string()
}

fn stripped_elements() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<(?:script|style|noscript|iframe)\b[^>]*>.*?</(?:script|style|noscript|iframe)\s*>")
            .ok()
    })
    .as_ref()
}

/// `href` attributes, matched only inside a tag.
fn link_targets() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)(?P<tag><[a-z][^<>]*?)\s+href\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).ok()
    })
    .as_ref()
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleSearchArgs {
    query: String,
    #[serde(default)]
    results: Option<u32>,
    #[serde(default)]
    exact_terms: Option<String>,
    #[serde(default)]
    exclude_terms: Option<String>,
    #[serde(default)]
    cx: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Option<Vec<Value>>,
}

/// Google Custom Search JSON API lookup.
pub struct GoogleSearch {
    http: reqwest::Client,
    api_key: Option<SecretString>,
    cx: Option<String>,
    base_url: String,
}

impl GoogleSearch {
    pub fn new(http: reqwest::Client, config: &SearchConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            cx: config.cx.clone(),
            base_url: config.base_url.clone(),
        }
    }

    async fn search(&self, args: &GoogleSearchArgs) -> Result<String, ToolError> {
        let api_key = self.api_key.as_ref().map(|key| key.expose_secret().to_string());
        let cx = args.cx.clone().or_else(|| self.cx.clone());
        let (Some(api_key), Some(cx)) = (api_key, cx) else {
            return Err(ToolError::Failed(
                "Google Search API key or Custom Search Engine (CSE) ID is missing.".to_string(),
            ));
        };

        let num = args.results.unwrap_or(5).to_string();
        let query = [
            ("key", api_key.as_str()),
            ("cx", cx.as_str()),
            ("q", args.query.as_str()),
            ("num", num.as_str()),
            ("exactTerms", args.exact_terms.as_deref().unwrap_or_default()),
            ("excludeTerms", args.exclude_terms.as_deref().unwrap_or_default()),
            ("hl", "en"),
        ];

        let response = self.http.get(&self.base_url).query(&query).send().await?.error_for_status()?;
        let body: SearchResponse = response.json().await?;

        match body.items {
            Some(items) => serde_json::to_string_pretty(&items)
                .map_err(|e| ToolError::Failed(e.to_string())),
            None => Ok("No results found".to_string()),
        }
    }
}

#[async_trait]
impl Tool for GoogleSearch {
    fn name(&self) -> &'static str {
        "google_search"
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: GoogleSearchArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        match self.search(&args).await {
            Ok(output) => Ok(output),
            Err(error) => {
                tracing::warn!(
                    event_name = "tool.google_search_failed",
                    error = %error,
                    "google search failed"
                );
                Ok("An error occurred while performing the Google search.".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use switchboard_core::config::SearchConfig;

    use super::{html_to_text, truncate_chars, GoogleSearch, Tool, WebScrape};

    #[test]
    fn html_to_text_drops_scripts_and_styles() {
        let html = "<html><head><style>body{color:red}</style></head><body>\
                    <h1>Title</h1><SCRIPT>alert('x')</SCRIPT><p>Hello <b>world</b></p></body></html>";
        let text = html_to_text(html, false);

        assert!(text.contains("Title"));
        assert!(text.contains("Hello"));
        assert!(text.contains("world"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color:red"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn ignore_links_removes_link_targets() {
        let html = r#"<p>Read <a href="https://example.com/docs">the docs</a> today</p>"#;
        let text = html_to_text(html, true);

        assert!(text.contains("the docs"));
        assert!(!text.contains("example.com"));
    }

    #[test]
    fn href_in_page_text_is_kept() {
        let html = r#"<p>Set href="x" in <a href='/docs'>markup</a>, then <iframe src="ad">banner</iframe>done</p>"#;
        let text = html_to_text(html, true);

        assert!(text.contains(r#"Set href="x" in"#));
        assert!(text.contains("markup"));
        assert!(!text.contains("/docs"));
        assert!(!text.contains("banner"));
        assert!(text.contains("done"));
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncate_chars("héllo world", 5), "héllo");
    }

    #[tokio::test]
    async fn invalid_url_reports_fetch_error() {
        let tool = WebScrape::new(reqwest::Client::new());
        let output = tool.execute(json!({"url": "not a url"})).await.expect("captured");

        assert_eq!(output, "Error fetching the URL not a url");
    }

    #[tokio::test]
    async fn search_without_credentials_reports_error_text() {
        let config = SearchConfig {
            api_key: None,
            cx: None,
            base_url: "https://www.googleapis.com/customsearch/v1".to_string(),
        };
        let tool = GoogleSearch::new(reqwest::Client::new(), &config);
        let output = tool.execute(json!({"query": "rust"})).await.expect("captured");

        assert_eq!(output, "An error occurred while performing the Google search.");
    }

    #[tokio::test]
    async fn malformed_arguments_are_rejected() {
        let tool = WebScrape::new(reqwest::Client::new());
        let error = tool.execute(json!({"link": "https://a.b"})).await.expect_err("missing url");
        assert!(error.to_string().contains("invalid arguments"));
    }
}
