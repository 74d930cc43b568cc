use std::sync::Arc;

use crate::config::Config;
use crate::generator::research::normalizer::ExtractionNormalizer;
use crate::generator::research::registry::CompetitorRegistry;
use crate::llm::LanguageModel;
use crate::tools::ToolGateway;

/// 单次运行的上下文，各阶段共享
pub struct RunContext {
    /// 配置
    pub config: Config,
    /// 外部数据采集能力
    pub tools: Arc<dyn ToolGateway>,
    /// LLM能力，未配置时只使用启发式抽取与模板摘要
    pub llm: Option<Arc<dyn LanguageModel>>,
    /// 本次运行的竞品注册表
    pub registry: CompetitorRegistry,
    /// 抽取归一化器
    pub normalizer: ExtractionNormalizer,
}

impl RunContext {
    /// 创建新的运行上下文
    pub fn new(
        config: Config,
        tools: Arc<dyn ToolGateway>,
        llm: Option<Arc<dyn LanguageModel>>,
    ) -> Self {
        let registry = CompetitorRegistry::new(config.collection.identity_match_ratio);
        let normalizer = ExtractionNormalizer::new(llm.clone());
        Self {
            config,
            tools,
            llm,
            registry,
            normalizer,
        }
    }

    pub fn llm_enabled(&self) -> bool {
        self.llm.is_some()
    }
}
