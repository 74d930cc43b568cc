//! 调研规划 - 根据请求生成有序的调研步骤

use crate::error::AnalysisError;
use crate::types::request::{AnalysisRequest, AnalysisType};
use crate::types::step::{CompetitorRef, ResearchStep, StepKind};

/// 调研规划器
#[derive(Debug, Default, Clone, Copy)]
pub struct ResearchPlanner;

impl ResearchPlanner {
    /// 生成调研计划：第一步总是识别竞品，其余为待展开的per-competitor模板步骤
    pub fn plan(&self, request: &AnalysisRequest) -> Result<Vec<ResearchStep>, AnalysisError> {
        request.validated_target()?;

        let mut steps = vec![ResearchStep::new(0, StepKind::IdentifyCompetitors, None)];
        steps.extend(
            Self::collection_kinds(request.analysis_type)
                .iter()
                .enumerate()
                .map(|(index, kind)| ResearchStep::new(index + 1, *kind, None)),
        );
        Ok(steps)
    }

    /// 各分析类型需要的采集步骤，省略与该类型无关的步骤
    pub fn collection_kinds(analysis_type: AnalysisType) -> &'static [StepKind] {
        match analysis_type {
            AnalysisType::Full | AnalysisType::Competitor => &[
                StepKind::CollectProfile,
                StepKind::CollectPricing,
                StepKind::CollectFeatures,
            ],
            AnalysisType::Market => &[StepKind::CollectProfile],
            AnalysisType::Swot => &[StepKind::CollectProfile, StepKind::CollectFeatures],
            AnalysisType::Pricing => &[StepKind::CollectPricing],
        }
    }

    /// 把模板步骤展开为每个竞品一个具体步骤，编号从next_id开始连续分配
    pub fn expand(
        templates: &[ResearchStep],
        competitors: &[CompetitorRef],
        next_id: usize,
    ) -> Vec<ResearchStep> {
        competitors
            .iter()
            .flat_map(|competitor| {
                templates
                    .iter()
                    .filter(|template| template.is_template())
                    .map(move |template| (template.kind, competitor.clone()))
            })
            .enumerate()
            .map(|(offset, (kind, competitor))| {
                ResearchStep::new(next_id + offset, kind, Some(competitor))
            })
            .collect()
    }
}

/// 识别竞品的查询变体
pub fn identification_queries(request: &AnalysisRequest) -> Vec<String> {
    let target = request.target.trim();
    let mut queries = vec![match request.industry_hint() {
        Some(industry) => format!("top competitors of {} in {} industry", target, industry),
        None => format!("top competitors of {}", target),
    }];
    queries.push(format!("{} alternatives", target));
    if let Some(audience) = request.audience_hint() {
        queries.push(format!("{} alternatives for {}", target, audience));
    }
    queries
}

/// 各采集步骤针对单个竞品的查询
pub fn collection_queries(kind: StepKind, competitor: &str) -> Vec<String> {
    match kind {
        StepKind::IdentifyCompetitors => Vec::new(),
        StepKind::CollectProfile => vec![
            format!("{} company overview", competitor),
            format!("{} market position competitors", competitor),
        ],
        StepKind::CollectPricing => vec![format!("{} pricing plans costs", competitor)],
        StepKind::CollectFeatures => vec![format!("{} features products services", competitor)],
    }
}
