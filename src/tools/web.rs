//! 基于reqwest的网页搜索与抓取实现

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::config::{CollectionConfig, ToolsConfig};
use crate::error::ToolError;
use crate::tools::{SearchHit, ToolGateway};

/// 抓取时忽略的元素
const SKIPPED_ELEMENTS: [&str; 7] = ["script", "style", "nav", "footer", "header", "noscript", "svg"];

/// 通过DuckDuckGo HTML接口搜索，通过HTTP GET抓取页面正文
#[derive(Clone)]
pub struct WebToolGateway {
    client: reqwest::Client,
    search_endpoint: String,
    max_page_chars: usize,
}

impl WebToolGateway {
    pub fn new(tools: &ToolsConfig, collection: &CollectionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(tools.user_agent.as_str())
            .timeout(Duration::from_secs(tools.request_timeout_secs))
            .build()
            .context("Failed to build http client")?;
        Ok(Self {
            client,
            search_endpoint: tools.search_endpoint.clone(),
            max_page_chars: collection.max_page_chars,
        })
    }

    async fn get_text(&self, request: reqwest::RequestBuilder, target: &str) -> Result<String, ToolError> {
        let response = request.send().await.map_err(|e| map_reqwest_error(e, target))?;
        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ToolError::Blocked {
                status: status.as_u16(),
                target: target.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ToolError::Http(format!("{} returned {}", target, status)));
        }
        response.text().await.map_err(|e| map_reqwest_error(e, target))
    }
}

#[async_trait]
impl ToolGateway for WebToolGateway {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError> {
        debug!("🔎 search: {}", query);
        let request = self.client.get(&self.search_endpoint).query(&[("q", query)]);
        let body = self.get_text(request, query).await?;
        let hits = parse_search_results(&body, max_results)?;
        if hits.is_empty() {
            return Err(ToolError::EmptyResult(query.to_string()));
        }
        Ok(hits)
    }

    async fn fetch(&self, url: &str) -> Result<String, ToolError> {
        let parsed = Url::parse(url).map_err(|e| ToolError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ToolError::InvalidUrl(url.to_string()));
        }
        debug!("🌐 fetch: {}", url);
        let body = self.get_text(self.client.get(parsed), url).await?;
        let text = extract_page_text(&body, self.max_page_chars);
        if text.is_empty() {
            return Err(ToolError::EmptyResult(url.to_string()));
        }
        Ok(text)
    }
}

fn map_reqwest_error(error: reqwest::Error, target: &str) -> ToolError {
    if error.is_timeout() {
        ToolError::Timeout(target.to_string())
    } else {
        ToolError::Http(format!("{}: {}", target, error))
    }
}

fn selector(css: &str) -> Result<Selector, ToolError> {
    Selector::parse(css).map_err(|e| ToolError::Parse(format!("{}: {}", css, e)))
}

/// 解析DuckDuckGo HTML搜索结果
pub fn parse_search_results(html: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError> {
    let document = Html::parse_document(html);
    let result_selector = selector(".result")?;
    let title_selector = selector(".result__a")?;
    let snippet_selector = selector(".result__snippet")?;

    let mut hits = Vec::new();
    for result in document.select(&result_selector) {
        let Some(anchor) = result.select(&title_selector).next() else {
            continue;
        };
        let Some(url) = anchor.value().attr("href").and_then(decode_result_url) else {
            continue;
        };
        let title = collapse_text(anchor);
        let snippet = result
            .select(&snippet_selector)
            .next()
            .map(collapse_text)
            .unwrap_or_default();
        if title.is_empty() && snippet.is_empty() {
            continue;
        }
        hits.push(SearchHit { title, snippet, url });
        if hits.len() >= max_results {
            break;
        }
    }
    Ok(hits)
}

/// DuckDuckGo的结果链接是跳转地址，真实地址在uddg参数中
fn decode_result_url(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;
    if url.host_str().is_some_and(|host| host.ends_with("duckduckgo.com")) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned());
    }
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 提取页面可见文本，去掉脚本、样式与导航类元素，并按字符数截断
pub fn extract_page_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);
    let mut words: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let skipped = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| SKIPPED_ELEMENTS.contains(&element.name()))
        });
        if !skipped {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ").chars().take(max_chars).collect()
}
