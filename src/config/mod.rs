use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "moonshot")]
    Moonshot,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "mistral")]
    Mistral,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Moonshot => write!(f, "moonshot"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::Mistral => write!(f, "mistral"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "moonshot" => Ok(LLMProvider::Moonshot),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "mistral" => Ok(LLMProvider::Mistral),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 报告输出路径
    pub output_path: PathBuf,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 数据采集配置
    pub collection: CollectionConfig,

    /// 工具网关配置
    pub tools: ToolsConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// 是否启用LLM辅助抽取与叙述合成
    pub enabled: bool,

    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 高能效模型，优先用于字段抽取等常规任务
    pub model_efficient: String,

    /// 高质量模型，用于长上下文的叙述合成，以及作为efficient失效情况下的兜底
    pub model_powerful: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,
}

/// 数据采集配置：重试、退避与运行时限
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CollectionConfig {
    /// 工具调用失败后的最大重试次数
    pub max_retries: u32,

    /// 退避基础延迟（毫秒），每次翻倍
    pub backoff_base_ms: u64,

    /// 退避延迟上限（毫秒）
    pub backoff_cap_ms: u64,

    /// 整次运行的采集时限（秒）
    pub run_deadline_secs: u64,

    /// 最大并发步骤数
    pub max_parallels: usize,

    /// 最多保留的竞品数量
    pub max_competitors: usize,

    /// 每次搜索返回的最大结果数
    pub search_max_results: usize,

    /// 身份匹配时子串长度比阈值
    pub identity_match_ratio: f64,

    /// 抓取页面保留的最大字符数
    pub max_page_chars: usize,
}

/// 工具网关配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    /// 请求使用的User-Agent
    pub user_agent: String,

    /// 单次请求超时（秒）
    pub request_timeout_secs: u64,

    /// 搜索服务地址（DuckDuckGo HTML接口）
    pub search_endpoint: String,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 加载配置：显式路径优先，其次当前目录下的rivalscope.toml，否则使用默认值
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let default_config_path = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("rivalscope.toml");
        if default_config_path.exists() {
            return Self::from_file(&default_config_path);
        }

        Ok(Self::default())
    }

    /// LLM是否可用（启用且配置了API KEY，ollama无需KEY）
    pub fn llm_available(&self) -> bool {
        self.llm.enabled
            && (self.llm.provider == LLMProvider::Ollama || !self.llm.api_key.trim().is_empty())
    }
}

impl CollectionConfig {
    /// 第attempt次重试前的退避时长（attempt从0开始）
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.backoff_base_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.backoff_cap_ms))
    }

    pub fn run_deadline(&self) -> Duration {
        Duration::from_secs(self.run_deadline_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("./rivalscope.out"),
            llm: LLMConfig::default(),
            collection: CollectionConfig::default(),
            tools: ToolsConfig::default(),
            verbose: false,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: LLMProvider::default(),
            api_key: std::env::var("RIVALSCOPE_LLM_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.openai.com/v1"),
            model_efficient: String::from("gpt-4o-mini"),
            model_powerful: String::from("gpt-4o"),
            max_tokens: 4096,
            temperature: 0.1,
            retry_attempts: 3,
            retry_delay_ms: 2000,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff_base_ms: 500,
            backoff_cap_ms: 4000,
            run_deadline_secs: 180,
            max_parallels: 4,
            max_competitors: 8,
            search_max_results: 8,
            identity_match_ratio: 0.6,
            max_page_chars: 4000,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            user_agent: String::from(
                "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
            ),
            request_timeout_secs: 15,
            search_endpoint: String::from("https://html.duckduckgo.com/html/"),
        }
    }
}
