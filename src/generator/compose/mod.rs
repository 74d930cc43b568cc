use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::generator::compose::narrative::{NarrativeGuard, draft_narrative, narrative_prompt};
use crate::generator::compose::pricing::build_pricing_table;
use crate::generator::compose::summary::template_summary;
use crate::generator::compose::vocabulary::FeatureVocabulary;
use crate::llm::LanguageModel;
use crate::types::competitor::CompetitorRecord;
use crate::types::payload::{
    AnalysisPayload, CompetitorView, ExecutiveSummary, LogEntry, LogKind, LogLevel,
    NarrativeSource, RunStatus,
};
use crate::types::request::AnalysisRequest;

pub mod narrative;
pub mod pricing;
pub mod summary;
pub mod vocabulary;

/// 叙述生成最多尝试次数（首次 + 一次纠正重试）
const NARRATIVE_ATTEMPTS: usize = 2;

/// 报告合成器：结构化部分为纯数据变换，叙述部分由LLM生成并经过实体校验
pub struct Synthesizer {
    llm: Option<Arc<dyn LanguageModel>>,
    excluded_names: Vec<String>,
    match_ratio: f64,
}

impl Synthesizer {
    pub fn new(llm: Option<Arc<dyn LanguageModel>>) -> Self {
        Self {
            llm,
            excluded_names: Vec::new(),
            match_ratio: 0.6,
        }
    }

    /// 识别阶段见过但未采用的候选名，叙述中不允许出现
    pub fn with_excluded_names(mut self, names: Vec<String>) -> Self {
        self.excluded_names = names;
        self
    }

    pub fn with_match_ratio(mut self, match_ratio: f64) -> Self {
        self.match_ratio = match_ratio;
        self
    }

    /// 合成报告载荷。
    /// 未配置LLM时使用模板摘要并视为完整结果；LLM叙述校验失败回退到模板时结果标记为partial。
    pub async fn synthesize(
        &self,
        records: &[CompetitorRecord],
        request: &AnalysisRequest,
    ) -> AnalysisPayload {
        info!("\n🤖 执行报告合成流程...");

        let vocabulary = FeatureVocabulary::standard().with_hints(&request.feature_hints());
        let feature_matrix = vocabulary.build_matrix(records);
        let pricing_table = build_pricing_table(records);
        let structural = template_summary(records, request);

        let mut log = Vec::new();
        let (summary, narrative_source, status) = match &self.llm {
            None => (structural, NarrativeSource::Template, RunStatus::Complete),
            Some(model) => {
                match self
                    .llm_narrative(model.as_ref(), records, request, &structural, &mut log)
                    .await
                {
                    Some(summary) => (summary, NarrativeSource::Llm, RunStatus::Complete),
                    None => {
                        log.push(LogEntry::new(
                            LogLevel::Warning,
                            LogKind::NarrativeFallback,
                            "narrative fell back to the structural template summary",
                        ));
                        (structural, NarrativeSource::Template, RunStatus::Partial)
                    }
                }
            }
        };

        info!(
            "✓ 报告合成完成：{} 个竞品，{} 个功能列，叙述来源 {:?}",
            records.len(),
            feature_matrix.features.len(),
            narrative_source
        );

        AnalysisPayload {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            request: request.clone(),
            status,
            summary,
            narrative_source,
            competitors: records.iter().map(CompetitorView::from).collect(),
            feature_matrix,
            pricing_table,
            log,
        }
    }

    async fn llm_narrative(
        &self,
        model: &dyn LanguageModel,
        records: &[CompetitorRecord],
        request: &AnalysisRequest,
        structural: &ExecutiveSummary,
        log: &mut Vec<LogEntry>,
    ) -> Option<ExecutiveSummary> {
        let guard = NarrativeGuard {
            records,
            target: request.target.trim(),
            excluded_names: &self.excluded_names,
            match_ratio: self.match_ratio,
        };

        let mut correction: Option<String> = None;
        for attempt in 1..=NARRATIVE_ATTEMPTS {
            let prompt = narrative_prompt(records, request, structural, correction.as_deref(), &guard);
            let draft = match draft_narrative(model, &prompt).await {
                Ok(draft) => draft,
                Err(e) => {
                    warn!("❌ 叙述生成调用失败: {}", e);
                    log.push(LogEntry::new(
                        LogLevel::Warning,
                        LogKind::SynthesisValidationFailure,
                        format!("narrative generation failed: {}", e),
                    ));
                    return None;
                }
            };
            match guard.validate(draft) {
                Ok(summary) => return Some(summary),
                Err(reason) => {
                    warn!(
                        "⚠️ 叙述校验未通过 (第 {} / {}次尝试): {}",
                        attempt, NARRATIVE_ATTEMPTS, reason
                    );
                    log.push(LogEntry::new(
                        LogLevel::Warning,
                        LogKind::SynthesisValidationFailure,
                        reason.clone(),
                    ));
                    correction = Some(reason);
                }
            }
        }
        None
    }
}
