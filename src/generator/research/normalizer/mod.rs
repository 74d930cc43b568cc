//! 抽取归一化 - 把工具返回的原始数据转换为带置信度与出处的竞品事实

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::generator::research::registry::identity_key;
use crate::llm::LanguageModel;
use crate::types::finding::{CompetitorFact, FactField, RawFinding};

pub mod heuristic;
pub mod llm_assisted;

pub use heuristic::HeuristicExtractor;
pub use llm_assisted::LlmAssistedExtractor;

/// 抽取策略，按字段类型选择
#[async_trait]
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// 该策略能否抽取指定字段
    fn supports(&self, field: FactField) -> bool;

    /// subject为空时只做公司名识别
    async fn extract(
        &self,
        finding: &RawFinding,
        subject: Option<&str>,
        fields: &[FactField],
    ) -> Vec<CompetitorFact>;
}

/// 归一化器：先走启发式规则，仍缺失的字段再交给LLM辅助策略
pub struct ExtractionNormalizer {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for ExtractionNormalizer {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ExtractionNormalizer {
    pub fn new(llm: Option<Arc<dyn LanguageModel>>) -> Self {
        let mut strategies: Vec<Box<dyn ExtractionStrategy>> = vec![Box::new(HeuristicExtractor)];
        if let Some(model) = llm {
            strategies.push(Box::new(LlmAssistedExtractor::new(model)));
        }
        Self { strategies }
    }

    /// 归一化一条原始数据。
    /// expected_field为空时：没有subject则识别公司名，有subject则尝试全部属性字段。
    pub async fn normalize(
        &self,
        finding: &RawFinding,
        expected_field: Option<FactField>,
        subject: Option<&str>,
    ) -> Vec<CompetitorFact> {
        let fields: Vec<FactField> = match (expected_field, subject) {
            (Some(field), _) => vec![field],
            (None, None) => vec![FactField::Name],
            (None, Some(_)) => FactField::ALL
                .into_iter()
                .filter(|field| *field != FactField::Name)
                .collect(),
        };
        self.normalize_fields(finding, &fields, subject).await
    }

    /// 按字段集合归一化，用于采集步骤一次抽取多个字段
    pub async fn normalize_fields(
        &self,
        finding: &RawFinding,
        fields: &[FactField],
        subject: Option<&str>,
    ) -> Vec<CompetitorFact> {
        if finding.source.trim().is_empty() || finding.full_text().trim().is_empty() {
            return Vec::new();
        }

        let mut facts: Vec<CompetitorFact> = Vec::new();
        let mut pending: Vec<FactField> = fields.to_vec();
        for strategy in &self.strategies {
            let wanted: Vec<FactField> = pending
                .iter()
                .copied()
                .filter(|field| strategy.supports(*field))
                .collect();
            if wanted.is_empty() {
                continue;
            }
            let extracted = strategy.extract(finding, subject, &wanted).await;
            debug!(
                "{} 策略从 {} 抽取到 {} 条事实",
                strategy.name(),
                finding.source,
                extracted.len()
            );
            for fact in extracted {
                keep_first(&mut facts, fact);
            }
            pending.retain(|field| !facts.iter().any(|fact| fact.field == *field));
            if pending.is_empty() {
                break;
            }
        }
        facts
    }
}

/// 同一来源同一字段的冲突值保留第一个；公司名按身份键去重
fn keep_first(facts: &mut Vec<CompetitorFact>, fact: CompetitorFact) {
    let duplicate = facts.iter().any(|existing| {
        existing.field == fact.field
            && (fact.field != FactField::Name
                || identity_key(&existing.value) == identity_key(&fact.value))
    });
    if !duplicate && !fact.value.is_empty() && !fact.provenance.trim().is_empty() {
        facts.push(fact);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::CompletionPrompt;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingModel {
        calls: AtomicUsize,
        response: Value,
    }

    #[async_trait]
    impl LanguageModel for CountingModel {
        async fn complete(&self, _prompt: &CompletionPrompt, _schema: &Value) -> Result<Value, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn test_identity_extraction_without_subject() {
        let normalizer = ExtractionNormalizer::default();
        let finding = RawFinding::search("https://www.asana.com", "Asana", "Asana is a work management platform.");
        let facts = normalizer.normalize(&finding, None, None).await;
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].field, FactField::Name);
        assert_eq!(facts[0].value, "Asana");
    }

    #[tokio::test]
    async fn test_empty_provenance_produces_nothing() {
        let normalizer = ExtractionNormalizer::default();
        let finding = RawFinding::search("  ", "Asana", "Asana is a work management platform.");
        assert!(normalizer.normalize(&finding, None, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_llm_only_consulted_for_missing_fields() {
        let model = Arc::new(CountingModel {
            calls: AtomicUsize::new(0),
            response: json!({"description": "ignored", "key_features": [], "market_position": "Challenger in work management"}),
        });
        let normalizer = ExtractionNormalizer::new(Some(model.clone()));
        let finding = RawFinding::search(
            "https://example.com/asana",
            "Asana",
            "Asana is a work management platform for teams.",
        );

        let facts = normalizer
            .normalize_fields(
                &finding,
                &[FactField::Description, FactField::MarketPosition],
                Some("Asana"),
            )
            .await;

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        let description: Vec<_> = facts.iter().filter(|f| f.field == FactField::Description).collect();
        assert_eq!(description.len(), 1);
        assert_eq!(description[0].value, "Asana is a work management platform for teams.");
        assert!(facts.iter().any(|f| f.field == FactField::MarketPosition
            && f.value == "Challenger in work management"));
    }

    #[tokio::test]
    async fn test_heuristics_cover_pricing_without_llm_call() {
        let model = Arc::new(CountingModel {
            calls: AtomicUsize::new(0),
            response: json!({}),
        });
        let normalizer = ExtractionNormalizer::new(Some(model.clone()));
        let finding = RawFinding::search(
            "https://example.com",
            "ClickUp pricing",
            "ClickUp has a free forever plan; Unlimited costs $7 per user per month.",
        );
        let facts = normalizer
            .normalize(&finding, Some(FactField::PricingModel), Some("ClickUp"))
            .await;
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].value, "Freemium, per-seat subscription");
        // pricing_model不在LLM策略支持范围内
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_keep_first_on_conflict() {
        let finding = RawFinding::search("https://a", "", "");
        let mut facts = Vec::new();
        keep_first(&mut facts, CompetitorFact::new(FactField::PricingModel, "Freemium", 0.5, &finding));
        keep_first(&mut facts, CompetitorFact::new(FactField::PricingModel, "Subscription", 0.9, &finding));
        keep_first(&mut facts, CompetitorFact::new(FactField::Name, "Asana", 0.6, &finding));
        keep_first(&mut facts, CompetitorFact::new(FactField::Name, "ClickUp", 0.6, &finding));
        keep_first(&mut facts, CompetitorFact::new(FactField::Name, "asana", 0.5, &finding));

        let values: Vec<_> = facts.iter().map(|f| f.value.as_str()).collect();
        assert_eq!(values, vec!["Freemium", "Asana", "ClickUp"]);
    }
}
