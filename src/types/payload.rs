use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::types::competitor::CompetitorRecord;
use crate::types::finding::{CompetitorFact, FactField};
use crate::types::request::AnalysisRequest;
use crate::types::step::FailureKind;

/// 运行结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Complete,
    Partial,
}

/// 三态功能支持
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSupport {
    Full,
    Partial,
    None,
}

impl FeatureSupport {
    pub fn symbol(&self) -> &'static str {
        match self {
            FeatureSupport::Full => "●",
            FeatureSupport::Partial => "◐",
            FeatureSupport::None => "○",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub competitor: String,
    pub cells: Vec<FeatureSupport>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub features: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

impl FeatureMatrix {
    pub fn cell(&self, competitor: &str, feature: &str) -> Option<FeatureSupport> {
        let column = self.features.iter().position(|f| f == feature)?;
        self.rows
            .iter()
            .find(|row| row.competitor == competitor)
            .and_then(|row| row.cells.get(column).copied())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRow {
    pub competitor: String,
    pub pricing_model: Option<String>,
    pub pricing_tiers: Option<String>,
    /// 最低付费价格（美元）
    pub starting_price: Option<f64>,
    pub has_free_tier: bool,
    pub source: Option<String>,
}

/// 执行摘要
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub market_position: String,
    pub key_findings: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ExecutiveSummary {
    /// 全部叙述文本，用于实体校验
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.market_position.as_str())
            .chain(self.key_findings.iter().map(String::as_str))
            .chain(self.opportunities.iter().map(String::as_str))
            .chain(self.threats.iter().map(String::as_str))
            .chain(self.recommendations.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeSource {
    Llm,
    Template,
}

/// 单个字段的胜出值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValue {
    pub value: String,
    pub confidence: f64,
    pub provenance: String,
}

/// 竞品视图，包含胜出值以及全部事实（用于出处审计）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorView {
    pub name: String,
    pub identity_key: String,
    pub fields: BTreeMap<FactField, FieldValue>,
    pub facts: Vec<CompetitorFact>,
}

impl From<&CompetitorRecord> for CompetitorView {
    fn from(record: &CompetitorRecord) -> Self {
        let fields = FactField::ALL
            .into_iter()
            .filter_map(|field| {
                record.winning(field).map(|fact| {
                    (
                        field,
                        FieldValue {
                            value: fact.value.clone(),
                            confidence: fact.confidence,
                            provenance: fact.provenance.clone(),
                        },
                    )
                })
            })
            .collect();
        Self {
            name: record.display_name().to_string(),
            identity_key: record.identity_key.clone(),
            fields,
            facts: record.facts.values().flatten().cloned().collect(),
        }
    }
}

impl CompetitorView {
    pub fn value(&self, field: FactField) -> Option<&str> {
        self.fields.get(&field).map(|v| v.value.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    ToolFailure,
    ExtractionFailure,
    Timeout,
    SelfExcluded,
    SynthesisValidationFailure,
    NarrativeFallback,
}

impl From<FailureKind> for LogKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::ToolFailure => LogKind::ToolFailure,
            FailureKind::ExtractionFailure => LogKind::ExtractionFailure,
            FailureKind::Timeout => LogKind::Timeout,
        }
    }
}

/// 透明度日志条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub kind: LogKind,
    pub step_id: Option<usize>,
    pub competitor: Option<String>,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            level,
            kind,
            step_id: None,
            competitor: None,
            message: message.into(),
        }
    }

    pub fn for_step(mut self, step_id: usize, competitor: Option<&str>) -> Self {
        self.step_id = Some(step_id);
        self.competitor = competitor.map(str::to_string);
        self
    }
}

/// 合成结果，仅包含值，可序列化后交给渲染方
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub request: AnalysisRequest,
    pub status: RunStatus,
    pub summary: ExecutiveSummary,
    pub narrative_source: NarrativeSource,
    pub competitors: Vec<CompetitorView>,
    pub feature_matrix: FeatureMatrix,
    pub pricing_table: Vec<PricingRow>,
    pub log: Vec<LogEntry>,
}

impl AnalysisPayload {
    pub fn is_partial(&self) -> bool {
        self.status == RunStatus::Partial
    }

    pub fn competitor(&self, name: &str) -> Option<&CompetitorView> {
        self.competitors
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// 载荷中的全部叙述文本
    pub fn narrative_texts(&self) -> Vec<&str> {
        self.summary.texts().collect()
    }
}
