use crate::config::{Config, LLMProvider};
use crate::types::request::{AnalysisRequest, AnalysisType};
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::warn;

/// rivalscope - 由Rust与AI驱动的竞品调研引擎
#[derive(Parser, Debug)]
#[command(name = "rivalscope")]
#[command(
    about = "Competitive-intelligence research engine. Discovers the competitors of a company or business idea from live web data, then produces an executive summary, feature matrix and pricing comparison."
)]
#[command(version)]
pub struct Args {
    /// 调研目标：公司名称或业务想法描述
    #[arg(short, long)]
    pub target: String,

    /// 所属行业
    #[arg(short, long)]
    pub industry: Option<String>,

    /// 目标用户群体
    #[arg(short, long)]
    pub audience: Option<String>,

    /// 关注的关键功能，逗号分隔
    #[arg(short, long)]
    pub features: Option<String>,

    /// 调研类型 (full, competitor, market, swot, pricing)
    #[arg(long, default_value = "full")]
    pub analysis_type: AnalysisType,

    /// 输出路径
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 采集阶段的运行时限（秒）
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// 最多保留的竞品数量
    #[arg(long)]
    pub max_competitors: Option<usize>,

    /// 最大并发步骤数
    #[arg(long)]
    pub max_parallels: Option<usize>,

    /// 禁用LLM，仅使用启发式抽取与模板摘要
    #[arg(long)]
    pub no_llm: bool,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,

    /// 高能效模型，用于字段抽取等常规任务
    #[arg(long)]
    pub model_efficient: Option<String>,

    /// 高质量模型，用于叙述合成，以及作为efficient失效情况下的兜底
    #[arg(long)]
    pub model_powerful: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// LLM Provider (openai, moonshot, deepseek, mistral, openrouter, anthropic, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,
}

impl Args {
    /// 从CLI参数构造调研请求
    pub fn to_request(&self) -> AnalysisRequest {
        AnalysisRequest {
            target: self.target.clone(),
            industry: self.industry.clone(),
            target_audience: self.audience.clone(),
            key_features: self.features.clone(),
            analysis_type: self.analysis_type,
        }
    }

    /// 将CLI参数转换为配置，CLI参数覆盖配置文件中的设置
    pub fn into_config(self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(output) = self.output {
            config.output_path = output;
        }

        // 覆盖LLM配置
        if let Some(provider_str) = self.llm_provider {
            match provider_str.parse::<LLMProvider>() {
                Ok(provider) => config.llm.provider = provider,
                Err(_) => warn!(
                    "⚠️ 警告: 未知的provider: {}，使用{}",
                    provider_str, config.llm.provider
                ),
            }
        }
        if let Some(llm_api_base_url) = self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url;
        }
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }
        if let Some(model_efficient) = self.model_efficient {
            config.llm.model_efficient = model_efficient;
        }
        if let Some(model_powerful) = self.model_powerful {
            config.llm.model_powerful = model_powerful;
        }
        if self.no_llm {
            config.llm.enabled = false;
        }

        // 采集配置
        if let Some(deadline_secs) = self.deadline_secs {
            config.collection.run_deadline_secs = deadline_secs;
        }
        if let Some(max_competitors) = self.max_competitors {
            config.collection.max_competitors = max_competitors;
        }
        if let Some(max_parallels) = self.max_parallels {
            config.collection.max_parallels = max_parallels;
        }

        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }
}
