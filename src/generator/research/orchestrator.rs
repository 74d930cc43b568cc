use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::CollectionConfig;
use crate::error::ToolError;
use crate::generator::context::RunContext;
use crate::generator::plan::{ResearchPlanner, collection_queries, identification_queries};
use crate::generator::research::registry::{identities_match, identity_key};
use crate::tools::SearchHit;
use crate::types::finding::{CompetitorFact, FactField, RawFinding};
use crate::types::payload::{LogEntry, LogKind, LogLevel};
use crate::types::request::AnalysisRequest;
use crate::types::step::{
    CompetitorRef, FailureKind, ResearchStep, StepFailure, StepKind, StepStatus,
};
use crate::utils::threads::do_parallel_with_limit;

/// 采集阶段的结果
#[derive(Debug, Clone, Default)]
pub struct CollectionReport {
    /// 全部步骤（按编号排序）的最终状态
    pub steps: Vec<ResearchStep>,
    pub log: Vec<LogEntry>,
    /// 是否因运行时限或取消而提前结束
    pub timed_out: bool,
    /// 因指向目标自身而被排除的候选名
    pub rejected_candidates: Vec<String>,
    /// 超出竞品数量上限而未采用的候选名
    pub discarded_candidates: Vec<String>,
    /// 重试后仍失败的工具调用次数
    pub tool_failures: usize,
}

impl CollectionReport {
    pub fn all_steps_done(&self) -> bool {
        self.steps
            .iter()
            .all(|step| step.status == StepStatus::Done)
    }
}

/// 采集编排器：执行调研计划，驱动工具网关、归一化与注册表
pub struct CollectionOrchestrator<'a> {
    context: &'a RunContext,
    board: Mutex<Vec<ResearchStep>>,
    log: Mutex<Vec<LogEntry>>,
    rejected: Mutex<Vec<String>>,
    discarded: Mutex<Vec<String>>,
    tool_failures: AtomicUsize,
}

impl<'a> CollectionOrchestrator<'a> {
    pub fn new(context: &'a RunContext) -> Self {
        Self {
            context,
            board: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
            rejected: Mutex::new(Vec::new()),
            discarded: Mutex::new(Vec::new()),
            tool_failures: AtomicUsize::new(0),
        }
    }

    fn collection(&self) -> &CollectionConfig {
        &self.context.config.collection
    }

    /// 执行计划直到全部步骤终结、运行时限到达或被取消
    pub async fn execute(
        &self,
        plan: Vec<ResearchStep>,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> CollectionReport {
        info!("🚀 开始执行竞品采集流程...");
        *self.board.lock() = plan;
        let deadline = Instant::now() + self.collection().run_deadline();

        // 超时或取消时丢弃run_plan，未完成的工具调用随之取消
        let timed_out = tokio::select! {
            _ = self.run_plan(request) => false,
            _ = tokio::time::sleep_until(deadline) => {
                warn!("⏰ 采集超过运行时限 {:?}，提前结束", self.collection().run_deadline());
                true
            }
            _ = cancel.cancelled() => {
                warn!("⏹️ 采集被取消，提前结束");
                true
            }
        };

        if timed_out {
            self.fail_unfinished_steps();
        }

        let mut steps = std::mem::take(&mut *self.board.lock());
        steps.sort_by_key(|step| step.id);
        info!("✓ 竞品采集流程执行完毕，共 {} 个步骤", steps.len());

        CollectionReport {
            steps,
            log: std::mem::take(&mut *self.log.lock()),
            timed_out,
            rejected_candidates: std::mem::take(&mut *self.rejected.lock()),
            discarded_candidates: std::mem::take(&mut *self.discarded.lock()),
            tool_failures: self.tool_failures.load(Ordering::SeqCst),
        }
    }

    async fn run_plan(&self, request: &AnalysisRequest) {
        let identify_id = self
            .board
            .lock()
            .iter()
            .find(|step| step.kind == StepKind::IdentifyCompetitors)
            .map(|step| step.id);
        let Some(identify_id) = identify_id else {
            warn!("⚠️ 调研计划缺少识别竞品步骤");
            return;
        };

        self.start_step(identify_id);
        let outcome = self.identify(identify_id, request).await;
        let competitors = match outcome {
            Ok(competitors) => competitors,
            Err(failure) => {
                self.finish_step(identify_id, Err(failure));
                Vec::new()
            }
        };
        if !competitors.is_empty() {
            self.finish_step(identify_id, Ok(competitors.len()));
        }

        // 身份确定后展开模板步骤，模板本身不再执行
        let expanded_ids: Vec<usize> = {
            let mut board = self.board.lock();
            let next_id = board.iter().map(|step| step.id + 1).max().unwrap_or(0);
            let expanded = ResearchPlanner::expand(&board, &competitors, next_id);
            board.retain(|step| !step.is_template());
            let ids = expanded.iter().map(|step| step.id).collect();
            board.extend(expanded);
            ids
        };
        info!(
            "📋 已识别 {} 个竞品，展开 {} 个采集步骤",
            competitors.len(),
            expanded_ids.len()
        );

        let tasks: Vec<_> = expanded_ids
            .into_iter()
            .map(|id| self.run_collection_step(id))
            .collect();
        do_parallel_with_limit(tasks, self.collection().max_parallels).await;
    }

    /// 识别竞品：多组查询、抽取公司名、排除目标自身并写入注册表。
    /// 每条结果归一化后立即入表，运行时限到达时已识别的竞品不会丢失。
    async fn identify(
        &self,
        step_id: usize,
        request: &AnalysisRequest,
    ) -> Result<Vec<CompetitorRef>, StepFailure> {
        let mut any_search_succeeded = false;
        let mut last_error: Option<ToolError> = None;

        for query in identification_queries(request) {
            match self.search_with_retry(&query).await {
                Ok(hits) => {
                    any_search_succeeded = true;
                    for hit in hits {
                        let finding = RawFinding::search(&hit.url, &hit.title, &hit.snippet);
                        let facts = self.context.normalizer.normalize(&finding, None, None).await;
                        for fact in facts {
                            self.admit_candidate(step_id, fact, request);
                        }
                    }
                }
                Err(e) => {
                    self.note_tool_failure(step_id, None, &query, &e);
                    last_error = Some(e);
                }
            }
        }

        // 识别先于一切采集步骤，此时注册表中即为已识别的竞品
        let identified: Vec<CompetitorRef> = self
            .context
            .registry
            .snapshot()
            .into_iter()
            .map(|record| CompetitorRef {
                identity_key: record.identity_key,
                name: record.first_seen_name,
            })
            .collect();
        if !identified.is_empty() {
            return Ok(identified);
        }
        Err(match (any_search_succeeded, last_error) {
            (false, Some(e)) => StepFailure {
                kind: FailureKind::ToolFailure,
                message: e.to_string(),
            },
            _ => StepFailure {
                kind: FailureKind::ExtractionFailure,
                message: "no competitor names found in search results".to_string(),
            },
        })
    }

    /// 对单个候选名执行自身排除与数量上限检查，通过后写入注册表
    fn admit_candidate(&self, step_id: usize, fact: CompetitorFact, request: &AnalysisRequest) {
        let registry = &self.context.registry;
        let name = fact.value.clone();
        let key = identity_key(&name);
        if identities_match(&key, &identity_key(&request.target), registry.match_ratio()) {
            self.reject_candidate(step_id, &name, &request.target);
            return;
        }
        let is_new = registry.resolve(&name).is_none();
        if is_new && registry.len() >= self.collection().max_competitors {
            debug!("已达到竞品数量上限，忽略候选 {}", name);
            let mut discarded = self.discarded.lock();
            if !discarded.iter().any(|existing| identity_key(existing) == key) {
                discarded.push(name);
            }
            return;
        }
        match registry.upsert(&name, vec![fact]) {
            Ok(record) if is_new => info!("🏢 识别到竞品: {}", record.first_seen_name),
            Ok(_) => {}
            Err(e) => debug!("忽略候选 {}: {}", name, e),
        }
    }

    async fn run_collection_step(&self, step_id: usize) {
        let Some((kind, competitor)) = self.start_step(step_id) else {
            return;
        };
        let Some(competitor) = competitor else {
            return;
        };
        let outcome = self.collect(step_id, kind, &competitor).await;
        self.finish_step(step_id, outcome);
    }

    /// 针对单个竞品执行搜索，并抓取首个搜索结果页面
    async fn collect(
        &self,
        step_id: usize,
        kind: StepKind,
        competitor: &CompetitorRef,
    ) -> Result<usize, StepFailure> {
        let fields = kind.fields();
        let mut produced = 0;
        let mut any_call_succeeded = false;
        let mut last_error: Option<ToolError> = None;
        let mut top_url: Option<String> = None;

        for query in collection_queries(kind, &competitor.name) {
            match self.search_with_retry(&query).await {
                Ok(hits) => {
                    any_call_succeeded = true;
                    if top_url.is_none() {
                        top_url = hits
                            .iter()
                            .map(|hit| hit.url.trim())
                            .find(|url| !url.is_empty())
                            .map(str::to_string);
                    }
                    for hit in &hits {
                        let finding = RawFinding::search(&hit.url, &hit.title, &hit.snippet);
                        produced += self.absorb(&finding, fields, competitor).await;
                    }
                }
                Err(e) => {
                    self.note_tool_failure(step_id, Some(&competitor.name), &query, &e);
                    last_error = Some(e);
                }
            }
        }

        if let Some(url) = top_url {
            match self.fetch_with_retry(&url).await {
                Ok(text) => {
                    any_call_succeeded = true;
                    let finding = RawFinding::scrape(&url, &text);
                    produced += self.absorb(&finding, fields, competitor).await;
                }
                Err(e) => {
                    self.note_tool_failure(step_id, Some(&competitor.name), &url, &e);
                    last_error = Some(e);
                }
            }
        }

        if produced > 0 {
            return Ok(produced);
        }
        Err(match (any_call_succeeded, last_error) {
            (false, Some(e)) => StepFailure {
                kind: FailureKind::ToolFailure,
                message: e.to_string(),
            },
            _ => StepFailure {
                kind: FailureKind::ExtractionFailure,
                message: format!("no usable {} facts for {}", kind, competitor.name),
            },
        })
    }

    /// 归一化一条原始数据并写入注册表，返回写入的事实数
    async fn absorb(
        &self,
        finding: &RawFinding,
        fields: &[FactField],
        competitor: &CompetitorRef,
    ) -> usize {
        let facts = self
            .context
            .normalizer
            .normalize_fields(finding, fields, Some(&competitor.name))
            .await;
        if facts.is_empty() {
            return 0;
        }
        let count = facts.len();
        match self.context.registry.upsert(&competitor.name, facts) {
            Ok(_) => count,
            Err(e) => {
                warn!("⚠️ 写入竞品 {} 失败: {}", competitor.name, e);
                0
            }
        }
    }

    async fn search_with_retry(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        let max_results = self.collection().search_max_results;
        self.with_retry(query, || async move {
            let hits = self.context.tools.search(query, max_results).await?;
            if hits.is_empty() {
                return Err(ToolError::EmptyResult(query.to_string()));
            }
            Ok(hits)
        })
        .await
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, ToolError> {
        self.with_retry(url, || async move {
            let text = self.context.tools.fetch(url).await?;
            if text.trim().is_empty() {
                return Err(ToolError::EmptyResult(url.to_string()));
            }
            Ok(text)
        })
        .await
    }

    /// 指数退避重试：基础延迟逐次翻倍并封顶
    async fn with_retry<T, F, Fut>(&self, target: &str, operation: F) -> Result<T, ToolError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ToolError>>,
    {
        let max_retries = self.collection().max_retries;
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() && attempt < max_retries => {
                    let delay = self.collection().backoff_delay(attempt);
                    attempt += 1;
                    warn!(
                        "❌ 工具调用出错，{}ms后重试 (第 {} / {}次重试) {}: {}",
                        delay.as_millis(),
                        attempt,
                        max_retries,
                        target,
                        err
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn start_step(&self, step_id: usize) -> Option<(StepKind, Option<CompetitorRef>)> {
        let mut board = self.board.lock();
        let step = board.iter_mut().find(|step| step.id == step_id)?;
        step.start();
        debug!("▶️ 步骤 {} 开始", step.label());
        Some((step.kind, step.competitor.clone()))
    }

    fn finish_step(&self, step_id: usize, outcome: Result<usize, StepFailure>) {
        let mut board = self.board.lock();
        let Some(step) = board.iter_mut().find(|step| step.id == step_id) else {
            return;
        };
        match outcome {
            Ok(produced) => {
                step.complete();
                info!("✅ 步骤 {} 完成，产出 {} 条数据", step.label(), produced);
            }
            Err(failure) => {
                warn!("❌ 步骤 {} 失败 [{}]: {}", step.label(), failure.kind, failure.message);
                let competitor = step.competitor.as_ref().map(|c| c.name.clone());
                step.fail(failure.kind, failure.message.clone());
                self.log.lock().push(
                    LogEntry::new(
                        LogLevel::Error,
                        failure.kind.into(),
                        format!("{} failed: {}", step.kind, failure.message),
                    )
                    .for_step(step_id, competitor.as_deref()),
                );
            }
        }
    }

    fn fail_unfinished_steps(&self) {
        let mut board = self.board.lock();
        let mut log = self.log.lock();
        for step in board.iter_mut().filter(|step| !step.status.is_terminal()) {
            step.fail(FailureKind::Timeout, "run deadline elapsed before the step finished");
            warn!("⏰ 步骤 {} 超时", step.label());
            log.push(
                LogEntry::new(
                    LogLevel::Error,
                    LogKind::Timeout,
                    format!("{} did not finish before the run deadline", step.kind),
                )
                .for_step(step.id, step.competitor.as_ref().map(|c| c.name.as_str())),
            );
        }
    }

    fn note_tool_failure(
        &self,
        step_id: usize,
        competitor: Option<&str>,
        target: &str,
        error: &ToolError,
    ) {
        self.tool_failures.fetch_add(1, Ordering::SeqCst);
        warn!("⚠️ 工具调用重试后仍失败 {}: {}", target, error);
        self.log.lock().push(
            LogEntry::new(
                LogLevel::Warning,
                LogKind::ToolFailure,
                format!("{}: {}", target, error),
            )
            .for_step(step_id, competitor),
        );
    }

    fn reject_candidate(&self, step_id: usize, name: &str, target: &str) {
        let mut rejected = self.rejected.lock();
        let key = identity_key(name);
        if rejected.iter().any(|existing| identity_key(existing) == key) {
            return;
        }
        info!("🚫 候选 {} 与目标 {} 相同，已排除", name, target.trim());
        rejected.push(name.to_string());
        self.log.lock().push(
            LogEntry::new(
                LogLevel::Info,
                LogKind::SelfExcluded,
                format!("'{}' excluded as the analysis target itself", name),
            )
            .for_step(step_id, None),
        );
    }
}

// Include tests
#[cfg(test)]
mod tests;
