//! 工具网关 - 对外部数据采集能力（网页搜索、页面抓取）的统一接口

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;

pub mod web;

pub use web::WebToolGateway;

/// 一条搜索结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

impl SearchHit {
    pub fn new(title: &str, snippet: &str, url: &str) -> Self {
        Self {
            title: title.to_string(),
            snippet: snippet.to_string(),
            url: url.to_string(),
        }
    }
}

/// 工具网关，失败以类型化结果返回，由调用方决定重试策略
#[async_trait]
pub trait ToolGateway: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, ToolError>;

    async fn fetch(&self, url: &str) -> Result<String, ToolError>;
}
