// 竞品调研采集系统
// 识别（identify_competitors）：多组查询变体 -> 抽取公司名 -> 排除目标自身 -> 注册表去重
// 采集（collect_profile / collect_pricing / collect_features）：按竞品展开，限流并发执行，
//   每步搜索 + 抓取首个结果页面 -> 归一化 -> 注册表合并

use tokio_util::sync::CancellationToken;

use crate::generator::context::RunContext;
use crate::generator::research::orchestrator::{CollectionOrchestrator, CollectionReport};
use crate::types::request::AnalysisRequest;
use crate::types::step::ResearchStep;

pub mod normalizer;
pub mod orchestrator;
pub mod registry;

/// 执行采集阶段
pub async fn execute(
    context: &RunContext,
    plan: Vec<ResearchStep>,
    request: &AnalysisRequest,
    cancel: &CancellationToken,
) -> CollectionReport {
    if !context.llm_enabled() {
        tracing::info!("   ⚠️ LLM未启用，仅使用启发式抽取");
    }

    let orchestrator = CollectionOrchestrator::new(context);
    orchestrator.execute(plan, request, cancel).await
}
