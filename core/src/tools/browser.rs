use crate::tools::extract_string_arg_opt;
use crate::traits::{Tool, ToolParameter, ToolParameters, ToolResult};
use anyhow::Context;
use async_trait::async_trait;
use futures_util::future::join_all;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::debug;

const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const MAX_SEARCH_RESULTS: usize = 5;
const MAX_PAGE_CHARS: usize = 12_000;
const USER_AGENT: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";

static RESULT_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a[^>]*class="result__a"[^>]*href="([^"]+)""#).expect("Invalid result link regex")
});

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b.*?</(script|style|noscript)>")
        .expect("Invalid script regex")
});

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("Invalid tag regex"));

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Searches the web and fetches pages, handing their text back for
/// summarization.
pub struct BrowserTool {
    client: reqwest::Client,
    search_url: String,
    max_results: usize,
}

impl BrowserTool {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            search_url: DUCKDUCKGO_HTML_URL.to_string(),
            max_results: MAX_SEARCH_RESULTS,
        }
    }

    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    pub fn with_max_results(mut self, max: usize) -> Self {
        self.max_results = max;
        self
    }

    async fn search(&self, query: &str) -> anyhow::Result<Vec<String>> {
        let html = self
            .client
            .get(&self.search_url)
            .query(&[("q", query)])
            .send()
            .await
            .context("Search request failed")?
            .error_for_status()
            .context("Search request was rejected")?
            .text()
            .await?;

        let mut urls: Vec<String> = Vec::new();
        for url in extract_result_urls(&html) {
            if !urls.contains(&url) {
                debug!("Found URL: {}", url);
                urls.push(url);
            }
            if urls.len() >= self.max_results {
                break;
            }
        }
        Ok(urls)
    }
}

impl Default for BrowserTool {
    fn default() -> Self {
        Self::new()
    }
}

async fn visit_url(client: reqwest::Client, url: String) -> anyhow::Result<String> {
    debug!("Visiting URL: {}", url);
    let html = client
        .get(&url)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let text = html_to_text(&html);
    if text.is_empty() {
        anyhow::bail!("{url} has no readable text");
    }
    Ok(format!("URL:{url}\nDATA: {text}\nNOTE: Ignore the cookie part"))
}

/// Resolves result links on a DuckDuckGo HTML results page to their targets.
fn extract_result_urls(html: &str) -> Vec<String> {
    RESULT_LINK
        .captures_iter(html)
        .filter_map(|caps| resolve_result_href(&caps[1].replace("&amp;", "&")))
        .collect()
}

fn resolve_result_href(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = reqwest::Url::parse(&absolute).ok()?;

    if url.path().starts_with("/l/") {
        return url
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, target)| target.into_owned());
    }

    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn html_to_text(html: &str) -> String {
    let without_scripts = SCRIPT_OR_STYLE.replace_all(html, " ");
    let without_tags = TAG.replace_all(&without_scripts, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    let collapsed = WHITESPACE.replace_all(&decoded, " ");
    collapsed.trim().chars().take(MAX_PAGE_CHARS).collect()
}

#[async_trait]
impl Tool for BrowserTool {
    fn name(&self) -> &str {
        "browser"
    }

    fn description(&self) -> String {
        "Browser is a tool that allows you to browse the web.".to_string()
    }

    fn parameters(&self) -> ToolParameters {
        let mut params = ToolParameters::new();
        params.insert(
            "search".into(),
            ToolParameter::optional("string", "The query to search on Browser."),
        );
        params.insert(
            "url".into(),
            ToolParameter::optional("string", "The URL to open on Browser."),
        );
        params
    }

    fn use_cases(&self) -> Vec<String> {
        [
            "User is asking about current events or something that requires real-time information (news, weather, sports scores, etc.)",
            "User is asking about some term you are totally unfamiliar with (it might be new)",
            "User explicitly asks you to browse or provide links to references",
            "User is asking about an event that happened recently",
            "User sends a URL and asks for a summary of the page",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    async fn run(&self, arguments: &Map<String, Value>, _query: &str) -> anyhow::Result<ToolResult> {
        let mut urls = Vec::new();

        let url = extract_string_arg_opt(arguments, "url", "");
        if !url.trim().is_empty() {
            urls.push(url.trim().to_string());
        }

        let search = extract_string_arg_opt(arguments, "search", "");
        if !search.trim().is_empty() {
            urls.extend(self.search(search.trim()).await?);
        }

        if urls.is_empty() && search.trim().is_empty() {
            anyhow::bail!("Browser needs a 'search' or 'url' argument");
        }

        let handles: Vec<_> = urls
            .into_iter()
            .map(|url| tokio::spawn(visit_url(self.client.clone(), url)))
            .collect();

        let mut pages = Vec::new();
        for joined in join_all(handles).await {
            match joined {
                Ok(Ok(page)) => pages.push(page),
                Ok(Err(e)) => debug!("Skipping page: {:#}", e),
                Err(e) => debug!("Page task did not complete: {}", e),
            }
        }

        Ok(ToolResult::prompts(pages))
    }
}
