#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    use crate::config::Config;
    use crate::error::ToolError;
    use crate::generator::context::RunContext;
    use crate::generator::plan::ResearchPlanner;
    use crate::generator::research::orchestrator::CollectionOrchestrator;
    use crate::tools::{SearchHit, ToolGateway};
    use crate::types::finding::FactField;
    use crate::types::payload::{LogKind, LogLevel};
    use crate::types::request::{AnalysisRequest, AnalysisType};
    use crate::types::step::{FailureKind, StepKind, StepStatus};

    /// 按查询返回固定结果的网关
    #[derive(Default)]
    struct ScriptedGateway {
        hits: HashMap<String, Vec<SearchHit>>,
        pages: HashMap<String, String>,
        /// 前N次搜索返回超时
        failing_searches: usize,
        /// 抓取页面前的等待时长
        fetch_delay: Option<Duration>,
        /// 此查询永远不会及时返回
        stalled_query: Option<String>,
        search_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
    }

    impl ScriptedGateway {
        fn with_hits(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
            self.hits.insert(query.to_string(), hits);
            self
        }

        fn with_page(mut self, url: &str, text: &str) -> Self {
            self.pages.insert(url.to_string(), text.to_string());
            self
        }
    }

    #[async_trait]
    impl ToolGateway for ScriptedGateway {
        async fn search(&self, query: &str, _max_results: usize) -> Result<Vec<SearchHit>, ToolError> {
            let call = self.search_calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failing_searches {
                return Err(ToolError::Timeout(query.to_string()));
            }
            if self.stalled_query.as_deref() == Some(query) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(self.hits.get(query).cloned().unwrap_or_default())
        }

        async fn fetch(&self, url: &str) -> Result<String, ToolError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.fetch_delay {
                tokio::time::sleep(delay).await;
            }
            self.pages.get(url).cloned().ok_or_else(|| ToolError::Http(format!("404 {}", url)))
        }
    }

    fn notion_gateway() -> ScriptedGateway {
        ScriptedGateway::default()
            .with_hits(
                "top competitors of Notion",
                vec![
                    SearchHit::new("Asana", "Asana is a work management platform for teams.", "https://asana.com"),
                    SearchHit::new("Notion", "Notion is a connected workspace.", "https://notion.so"),
                ],
            )
            .with_hits(
                "Asana pricing plans costs",
                vec![SearchHit::new(
                    "Asana pricing",
                    "Asana offers a free plan and paid subscription plans billed per user per month.",
                    "https://asana.com/pricing",
                )],
            )
            .with_page(
                "https://asana.com/pricing",
                "Personal $0 forever. Starter: $10.99 per user per month. Advanced $24.99/user/month.",
            )
    }

    fn context(gateway: Arc<ScriptedGateway>, configure: impl FnOnce(&mut Config)) -> RunContext {
        let mut config = Config::default();
        config.collection.max_parallels = 2;
        configure(&mut config);
        RunContext::new(config, gateway, None)
    }

    #[tokio::test(start_paused = true)]
    async fn test_pricing_run_collects_tiers_and_excludes_target() {
        let gateway = Arc::new(notion_gateway());
        let context = context(gateway.clone(), |_| {});
        let request = AnalysisRequest::new("Notion", AnalysisType::Pricing);
        let plan = ResearchPlanner.plan(&request).unwrap();

        let report = CollectionOrchestrator::new(&context)
            .execute(plan, &request, &CancellationToken::new())
            .await;

        assert!(!report.timed_out);
        assert_eq!(report.rejected_candidates, vec!["Notion".to_string()]);
        assert!(report.log.iter().any(|entry| entry.kind == LogKind::SelfExcluded));

        // 识别步骤 + Asana的定价步骤，模板已被替换
        assert_eq!(report.steps.len(), 2);
        assert!(report.all_steps_done());
        assert_eq!(report.steps[1].kind, StepKind::CollectPricing);
        assert_eq!(gateway.fetch_calls.load(Ordering::SeqCst), 1);

        let records = context.registry.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].display_name(), "Asana");
        assert_eq!(
            records[0].value(FactField::PricingModel),
            Some("Freemium, per-seat subscription")
        );
        assert_eq!(
            records[0].value(FactField::PricingTiers),
            Some("Personal: $0; Starter: $10.99/user/month; Advanced: $24.99/user/month")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_search_failures_are_retried() {
        let gateway = Arc::new(ScriptedGateway {
            failing_searches: 2,
            ..notion_gateway()
        });
        let context = context(gateway.clone(), |_| {});
        let request = AnalysisRequest::new("Notion", AnalysisType::Pricing);
        let plan = ResearchPlanner.plan(&request).unwrap();

        let started = tokio::time::Instant::now();
        let report = CollectionOrchestrator::new(&context)
            .execute(plan, &request, &CancellationToken::new())
            .await;

        assert!(report.all_steps_done());
        assert_eq!(context.registry.len(), 1);
        // 两次退避：500ms + 1000ms
        assert!(started.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identification_tool_failure_after_retries() {
        let gateway = Arc::new(ScriptedGateway {
            failing_searches: usize::MAX,
            ..ScriptedGateway::default()
        });
        let context = context(gateway.clone(), |_| {});
        let request = AnalysisRequest::new("Notion", AnalysisType::Full);
        let plan = ResearchPlanner.plan(&request).unwrap();

        let report = CollectionOrchestrator::new(&context)
            .execute(plan, &request, &CancellationToken::new())
            .await;

        // 两组查询，各1次调用 + 2次重试
        assert_eq!(gateway.search_calls.load(Ordering::SeqCst), 6);
        assert_eq!(report.tool_failures, 2);
        assert_eq!(report.steps.len(), 1);
        assert_eq!(report.steps[0].status, StepStatus::Failed);
        assert_eq!(
            report.steps[0].failure.as_ref().map(|f| f.kind),
            Some(FailureKind::ToolFailure)
        );
        assert!(context.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_marks_pending_steps_as_timeout() {
        let gateway = Arc::new(ScriptedGateway {
            fetch_delay: Some(Duration::from_secs(3600)),
            ..notion_gateway()
        });
        let context = context(gateway.clone(), |config| {
            config.collection.run_deadline_secs = 30;
        });
        let request = AnalysisRequest::new("Notion", AnalysisType::Pricing);
        let plan = ResearchPlanner.plan(&request).unwrap();

        let report = CollectionOrchestrator::new(&context)
            .execute(plan, &request, &CancellationToken::new())
            .await;

        assert!(report.timed_out);
        assert_eq!(report.steps[0].status, StepStatus::Done);
        let pricing = &report.steps[1];
        assert_eq!(pricing.status, StepStatus::Failed);
        assert_eq!(pricing.failure.as_ref().map(|f| f.kind), Some(FailureKind::Timeout));
        assert!(report.log.iter().any(|entry| entry.kind == LogKind::Timeout
            && entry.step_id == Some(pricing.id)));

        // 超时前已采集的数据保留
        let records = context.registry.snapshot();
        assert!(records[0].has_field(FactField::PricingModel));
        assert!(!records[0].has_field(FactField::PricingTiers));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_during_identification_keeps_found_competitors() {
        let gateway = Arc::new(ScriptedGateway {
            stalled_query: Some("Notion alternatives".to_string()),
            ..notion_gateway()
        });
        let context = context(gateway.clone(), |config| {
            config.collection.run_deadline_secs = 30;
        });
        let request = AnalysisRequest::new("Notion", AnalysisType::Pricing);
        let plan = ResearchPlanner.plan(&request).unwrap();

        let report = CollectionOrchestrator::new(&context)
            .execute(plan, &request, &CancellationToken::new())
            .await;

        assert!(report.timed_out);
        assert_eq!(report.steps[0].kind, StepKind::IdentifyCompetitors);
        assert_eq!(
            report.steps[0].failure.as_ref().map(|f| f.kind),
            Some(FailureKind::Timeout)
        );
        assert_eq!(report.rejected_candidates, vec!["Notion".to_string()]);

        // 首组查询的结果在超时前已经入表
        let records = context.registry.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].display_name(), "Asana");
        assert!(report.steps.iter().all(|step| step.status.is_terminal()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_stops_collection() {
        let gateway = Arc::new(ScriptedGateway {
            fetch_delay: Some(Duration::from_secs(3600)),
            ..notion_gateway()
        });
        let context = context(gateway.clone(), |_| {});
        let request = AnalysisRequest::new("Notion", AnalysisType::Pricing);
        let plan = ResearchPlanner.plan(&request).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let report = CollectionOrchestrator::new(&context)
            .execute(plan, &request, &cancel)
            .await;

        assert!(report.timed_out);
        assert!(started.elapsed() < Duration::from_secs(60));
        assert!(report.steps.iter().all(|step| step.status.is_terminal()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_competitor_cap() {
        let gateway = Arc::new(ScriptedGateway::default().with_hits(
            "top competitors of Notion",
            vec![SearchHit::new(
                "Notion alternatives",
                "Popular choices include Asana, ClickUp, Coda and Obsidian.",
                "https://example.com/list",
            )],
        ));
        let context = context(gateway.clone(), |config| {
            config.collection.max_competitors = 2;
        });
        let request = AnalysisRequest::new("Notion", AnalysisType::Market);
        let plan = ResearchPlanner.plan(&request).unwrap();

        let report = CollectionOrchestrator::new(&context)
            .execute(plan, &request, &CancellationToken::new())
            .await;

        let names: Vec<_> = context
            .registry
            .snapshot()
            .iter()
            .map(|record| record.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["Asana", "ClickUp"]);
        assert_eq!(report.discarded_candidates, vec!["Coda", "Obsidian"]);
        // 识别 + 两个竞品的画像步骤；画像查询无结果，按抽取/工具失败记录
        assert_eq!(report.steps.len(), 3);
        assert!(report.steps[1..].iter().all(|step| step.status == StepStatus::Failed));
        assert_eq!(
            report
                .log
                .iter()
                .filter(|entry| entry.step_id.is_some_and(|id| id >= 1))
                .filter(|entry| entry.kind == LogKind::ToolFailure
                    && entry.level == LogLevel::Error)
                .count(),
            2
        );
    }
}
