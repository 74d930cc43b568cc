//! LLM辅助抽取：启发式规则无法覆盖的自由文本字段

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::ExtractionStrategy;
use super::heuristic::{clean_candidate, is_attributable};
use crate::llm::{CompletionPrompt, LanguageModel, extract};
use crate::types::finding::{CompetitorFact, FactField, RawFinding};
use crate::utils::signals::mentions;

const LLM_CONFIDENCE: f64 = 0.6;
const MAX_PROMPT_CHARS: usize = 4000;

/// 从一段文本中识别出的公司名
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedNames {
    /// 文本中明确出现的公司或产品名称
    pub companies: Vec<String>,
}

/// 从一段文本中抽取的竞品画像
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedProfile {
    /// 一句话描述该公司做什么，文本中没有则为空
    #[serde(default)]
    pub description: Option<String>,
    /// 主要功能或产品能力
    #[serde(default)]
    pub key_features: Vec<String>,
    /// 市场地位（领导者、挑战者、细分玩家等）
    #[serde(default)]
    pub market_position: Option<String>,
    /// 目标客户群
    #[serde(default)]
    pub target_audience: Option<String>,
}

/// 基于LanguageModel的抽取策略
pub struct LlmAssistedExtractor {
    model: Arc<dyn LanguageModel>,
}

impl LlmAssistedExtractor {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    async fn extract_names(&self, finding: &RawFinding) -> Vec<CompetitorFact> {
        let text = finding.full_text();
        let prompt = CompletionPrompt::new(
            "You identify company and product names in web search results. \
             Only list names that literally appear in the text. Never guess.",
            format!("Text:\n{}", truncate(&text, MAX_PROMPT_CHARS)),
        );
        match extract::<ExtractedNames>(self.model.as_ref(), &prompt).await {
            Ok(names) => names
                .companies
                .iter()
                .map(|name| clean_candidate(name))
                .filter(|name| is_grounded_name(&text, name))
                .map(|name| CompetitorFact::new(FactField::Name, name, LLM_CONFIDENCE, finding))
                .collect(),
            Err(e) => {
                warn!("⚠️ LLM公司名抽取失败 {}: {}", finding.source, e);
                Vec::new()
            }
        }
    }

    async fn extract_profile(
        &self,
        finding: &RawFinding,
        subject: &str,
        fields: &[FactField],
    ) -> Vec<CompetitorFact> {
        if !is_attributable(finding, subject) {
            return Vec::new();
        }
        let wanted: Vec<&str> = fields.iter().map(FactField::as_str).collect();
        let prompt = CompletionPrompt::new(
            "You extract facts about one company from a web page or search snippet. \
             Use only information stated in the text; leave a field empty when the text is silent.",
            format!(
                "Company: {}\nFields needed: {}\nText:\n{}",
                subject,
                wanted.join(", "),
                truncate(&finding.full_text(), MAX_PROMPT_CHARS)
            ),
        );
        let profile = match extract::<ExtractedProfile>(self.model.as_ref(), &prompt).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!("⚠️ LLM画像抽取失败 {} ({}): {}", subject, finding.source, e);
                return Vec::new();
            }
        };

        let features = profile
            .key_features
            .iter()
            .map(|feature| feature.trim().to_lowercase())
            .filter(|feature| !feature.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        let candidates = [
            (FactField::Description, profile.description.unwrap_or_default()),
            (FactField::KeyFeatures, features),
            (FactField::MarketPosition, profile.market_position.unwrap_or_default()),
            (FactField::TargetAudience, profile.target_audience.unwrap_or_default()),
        ];
        candidates
            .into_iter()
            .filter(|(field, value)| fields.contains(field) && !value.trim().is_empty())
            .map(|(field, value)| CompetitorFact::new(field, &value, LLM_CONFIDENCE, finding))
            .collect()
    }
}

/// 模型给出的名称必须在原文中出现，且含有字母、不超过4个词
fn is_grounded_name(text: &str, name: &str) -> bool {
    let words = name.split_whitespace().count();
    (1..=4).contains(&words) && name.chars().any(char::is_alphabetic) && mentions(text, name)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

#[async_trait]
impl ExtractionStrategy for LlmAssistedExtractor {
    fn name(&self) -> &'static str {
        "llm_assisted"
    }

    fn supports(&self, field: FactField) -> bool {
        matches!(
            field,
            FactField::Name
                | FactField::Description
                | FactField::KeyFeatures
                | FactField::MarketPosition
                | FactField::TargetAudience
        )
    }

    async fn extract(
        &self,
        finding: &RawFinding,
        subject: Option<&str>,
        fields: &[FactField],
    ) -> Vec<CompetitorFact> {
        debug!("🤖 LLM辅助抽取 {} 字段: {:?}", finding.source, fields);
        let mut facts = Vec::new();
        if fields.contains(&FactField::Name) {
            facts.extend(self.extract_names(finding).await);
        }
        let profile_fields: Vec<FactField> = fields
            .iter()
            .copied()
            .filter(|field| *field != FactField::Name)
            .collect();
        if let (Some(subject), false) = (subject, profile_fields.is_empty()) {
            facts.extend(self.extract_profile(finding, subject, &profile_fields).await);
        }
        facts
    }
}
