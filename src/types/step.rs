use serde::{Deserialize, Serialize};

use crate::types::finding::FactField;

/// 调研步骤类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    IdentifyCompetitors,
    CollectProfile,
    CollectPricing,
    CollectFeatures,
}

impl StepKind {
    /// 该步骤负责采集的字段
    pub fn fields(&self) -> &'static [FactField] {
        match self {
            StepKind::IdentifyCompetitors => &[FactField::Name],
            StepKind::CollectProfile => &[
                FactField::Description,
                FactField::MarketPosition,
                FactField::TargetAudience,
                FactField::Revenue,
                FactField::MarketShare,
            ],
            StepKind::CollectPricing => &[FactField::PricingModel, FactField::PricingTiers],
            StepKind::CollectFeatures => &[FactField::KeyFeatures, FactField::Description],
        }
    }

    pub fn is_per_competitor(&self) -> bool {
        !matches!(self, StepKind::IdentifyCompetitors)
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::IdentifyCompetitors => write!(f, "identify_competitors"),
            StepKind::CollectProfile => write!(f, "collect_profile"),
            StepKind::CollectPricing => write!(f, "collect_pricing"),
            StepKind::CollectFeatures => write!(f, "collect_features"),
        }
    }
}

/// 步骤状态：pending → running → {done, failed}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Done | StepStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ToolFailure,
    ExtractionFailure,
    Timeout,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::ToolFailure => write!(f, "tool_failure"),
            FailureKind::ExtractionFailure => write!(f, "extraction_failure"),
            FailureKind::Timeout => write!(f, "timeout"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// 已识别竞品的引用
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitorRef {
    pub identity_key: String,
    pub name: String,
}

/// 一个调研步骤；competitor为空的per-competitor步骤是待展开的模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchStep {
    pub id: usize,
    pub kind: StepKind,
    pub competitor: Option<CompetitorRef>,
    pub status: StepStatus,
    pub failure: Option<StepFailure>,
}

impl ResearchStep {
    pub fn new(id: usize, kind: StepKind, competitor: Option<CompetitorRef>) -> Self {
        Self {
            id,
            kind,
            competitor,
            status: StepStatus::Pending,
            failure: None,
        }
    }

    pub fn is_template(&self) -> bool {
        self.kind.is_per_competitor() && self.competitor.is_none()
    }

    pub fn start(&mut self) {
        if self.status == StepStatus::Pending {
            self.status = StepStatus::Running;
        }
    }

    pub fn complete(&mut self) {
        if !self.status.is_terminal() {
            self.status = StepStatus::Done;
        }
    }

    pub fn fail(&mut self, kind: FailureKind, message: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = StepStatus::Failed;
            self.failure = Some(StepFailure {
                kind,
                message: message.into(),
            });
        }
    }

    /// 日志中使用的步骤描述
    pub fn label(&self) -> String {
        match &self.competitor {
            Some(competitor) => format!("#{} {}({})", self.id, self.kind, competitor.name),
            None => format!("#{} {}", self.id, self.kind),
        }
    }
}
