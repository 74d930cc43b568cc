use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 原始发现的来源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Search,
    Scrape,
}

/// 工具返回的一条原始数据，仅在归一化之前存在
#[derive(Debug, Clone, PartialEq)]
pub struct RawFinding {
    pub source_kind: SourceKind,
    /// 搜索结果或抓取页面的URL；没有URL时为查询语句
    pub source: String,
    /// 搜索结果的标题，抓取页面时为空
    pub title: String,
    pub text: String,
    pub observed_at: DateTime<Utc>,
}

impl RawFinding {
    pub fn search(url: &str, title: &str, snippet: &str) -> Self {
        Self {
            source_kind: SourceKind::Search,
            source: url.to_string(),
            title: title.to_string(),
            text: snippet.to_string(),
            observed_at: Utc::now(),
        }
    }

    pub fn scrape(url: &str, text: &str) -> Self {
        Self {
            source_kind: SourceKind::Scrape,
            source: url.to_string(),
            title: String::new(),
            text: text.to_string(),
            observed_at: Utc::now(),
        }
    }

    pub fn observed(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }

    /// 标题与正文合并后的全文
    pub fn full_text(&self) -> String {
        if self.title.is_empty() {
            self.text.clone()
        } else {
            format!("{}. {}", self.title, self.text)
        }
    }
}

/// 竞品属性字段（固定集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactField {
    Name,
    Description,
    PricingModel,
    PricingTiers,
    KeyFeatures,
    MarketPosition,
    TargetAudience,
    Revenue,
    MarketShare,
}

impl FactField {
    pub const ALL: [FactField; 9] = [
        FactField::Name,
        FactField::Description,
        FactField::PricingModel,
        FactField::PricingTiers,
        FactField::KeyFeatures,
        FactField::MarketPosition,
        FactField::TargetAudience,
        FactField::Revenue,
        FactField::MarketShare,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FactField::Name => "name",
            FactField::Description => "description",
            FactField::PricingModel => "pricing_model",
            FactField::PricingTiers => "pricing_tiers",
            FactField::KeyFeatures => "key_features",
            FactField::MarketPosition => "market_position",
            FactField::TargetAudience => "target_audience",
            FactField::Revenue => "revenue",
            FactField::MarketShare => "market_share",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == value.trim().to_lowercase())
    }
}

impl std::fmt::Display for FactField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 归一化后的单条竞品属性
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorFact {
    pub field: FactField,
    pub value: String,
    /// 置信度，取值范围[0,1]
    pub confidence: f64,
    /// 出处（URL或查询语句），不能为空
    pub provenance: String,
    pub source_kind: SourceKind,
    pub observed_at: DateTime<Utc>,
}

impl CompetitorFact {
    pub fn new(field: FactField, value: &str, confidence: f64, finding: &RawFinding) -> Self {
        Self {
            field,
            value: value.trim().to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            provenance: finding.source.clone(),
            source_kind: finding.source_kind,
            observed_at: finding.observed_at,
        }
    }

    /// 合并策略的排序：置信度优先，其次观测时间，最后按值比较以保证结果与到达顺序无关
    pub fn outranks(&self, other: &CompetitorFact) -> bool {
        self.confidence
            .total_cmp(&other.confidence)
            .then(self.observed_at.cmp(&other.observed_at))
            .then_with(|| self.value.cmp(&other.value))
            .then_with(|| self.provenance.cmp(&other.provenance))
            .is_gt()
    }

    /// 判断两条事实是否为同一观测（用于幂等合并）
    pub fn same_observation(&self, other: &CompetitorFact) -> bool {
        self.field == other.field
            && self.value == other.value
            && self.provenance == other.provenance
            && self.confidence == other.confidence
            && self.observed_at == other.observed_at
    }
}
