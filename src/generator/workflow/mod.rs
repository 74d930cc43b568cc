use crate::config::Config;
use crate::error::AnalysisError;
use crate::generator::compose::Synthesizer;
use crate::generator::context::RunContext;
use crate::generator::outlet::{DiskOutlet, Outlet};
use crate::generator::plan::ResearchPlanner;
use crate::llm::LanguageModel;
use crate::llm::client::LLMClient;
use crate::tools::{ToolGateway, WebToolGateway};
use crate::types::payload::{AnalysisPayload, RunStatus};
use crate::types::request::AnalysisRequest;

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 时间跟踪作用域
pub struct TimingScope {
    start_time: Instant,
    /// 按结束顺序记录的阶段耗时
    phase_durations: Vec<(String, Duration)>,
    phase_start_times: Vec<(String, Instant)>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_durations: Vec::new(),
            phase_start_times: Vec::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, phase_name: &str) {
        self.phase_start_times
            .retain(|(name, _)| name != phase_name);
        self.phase_start_times
            .push((phase_name.to_string(), Instant::now()));
    }

    /// 结束一个阶段的计时
    pub fn end_phase(&mut self, phase_name: &str) -> Option<Duration> {
        let index = self
            .phase_start_times
            .iter()
            .position(|(name, _)| name == phase_name)?;
        let (name, start_time) = self.phase_start_times.remove(index);
        let duration = start_time.elapsed();
        self.phase_durations.push((name, duration));
        Some(duration)
    }

    /// 获取总执行时间
    pub fn get_total_duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn get_phase_duration(&self, phase_name: &str) -> Option<Duration> {
        self.phase_durations
            .iter()
            .find(|(name, _)| name == phase_name)
            .map(|(_, duration)| *duration)
    }

    /// 获取格式化的执行时间报告，按流水线顺序列出各阶段耗时及占比
    pub fn generate_timing_report(&self) -> String {
        let total = self.get_total_duration().as_secs_f64();
        let mut report = format!("总执行时间: {:.2}秒\n", total);

        let phases: Vec<(&str, Duration)> = TimingKeys::get_all_phase_keys()
            .into_iter()
            .filter_map(|key| self.get_phase_duration(key).map(|duration| (key, duration)))
            .collect();
        if !phases.is_empty() {
            report.push_str("\n各阶段执行时间:\n");
            for (phase, duration) in phases {
                let share = if total > 0.0 {
                    duration.as_secs_f64() / total * 100.0
                } else {
                    0.0
                };
                report.push_str(&format!(
                    "- {}: {:.3}秒 ({:.1}%)\n",
                    phase,
                    duration.as_secs_f64(),
                    share
                ));
            }
        }

        report
    }
}

/// 时间跟踪常量
pub struct TimingKeys;

impl TimingKeys {
    pub const PLAN: &'static str = "plan";
    pub const COLLECT: &'static str = "collect";
    pub const SYNTHESIZE: &'static str = "synthesize";
    pub const OUTPUT: &'static str = "output";

    /// 获取所有阶段的键列表
    pub fn get_all_phase_keys() -> Vec<&'static str> {
        vec![Self::PLAN, Self::COLLECT, Self::SYNTHESIZE, Self::OUTPUT]
    }
}

/// 调研流水线：规划 -> 采集 -> 合成，每次运行拥有独立的注册表与时限
pub struct AnalysisPipeline {
    config: Config,
    tools: Arc<dyn ToolGateway>,
    llm: Option<Arc<dyn LanguageModel>>,
}

impl AnalysisPipeline {
    pub fn new(config: Config, tools: Arc<dyn ToolGateway>) -> Self {
        Self {
            config,
            tools,
            llm: None,
        }
    }

    /// 启用LLM辅助抽取与叙述合成
    pub fn with_llm(mut self, llm: Arc<dyn LanguageModel>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub async fn run_analysis(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisPayload, AnalysisError> {
        self.run_analysis_with_cancel(request, CancellationToken::new())
            .await
    }

    /// 执行一次完整调研。
    /// 只有非法请求与一个竞品都未识别到会返回错误，其余失败都降级记录到载荷日志中。
    pub async fn run_analysis_with_cancel(
        &self,
        request: &AnalysisRequest,
        cancel: CancellationToken,
    ) -> Result<AnalysisPayload, AnalysisError> {
        let mut timing = TimingScope::new();

        timing.start_phase(TimingKeys::PLAN);
        let plan = ResearchPlanner.plan(request)?;
        let target = request.target.trim();
        info!("📋 调研计划生成完毕：{} 的 {} 分析，{} 个步骤", target, request.analysis_type, plan.len());
        timing.end_phase(TimingKeys::PLAN);

        let context = RunContext::new(self.config.clone(), self.tools.clone(), self.llm.clone());

        timing.start_phase(TimingKeys::COLLECT);
        let report = crate::generator::research::execute(&context, plan, request, &cancel).await;
        timing.end_phase(TimingKeys::COLLECT);

        if context.registry.is_empty() {
            warn!("❌ 未能识别到 {} 的任何竞品", target);
            return Err(AnalysisError::NoCompetitorsIdentified {
                target: target.to_string(),
            });
        }
        let records = context.registry.finalize();

        timing.start_phase(TimingKeys::SYNTHESIZE);
        let synthesizer = Synthesizer::new(context.llm.clone())
            .with_excluded_names(report.discarded_candidates.clone())
            .with_match_ratio(self.config.collection.identity_match_ratio);
        let mut payload = synthesizer.synthesize(&records, request).await;
        timing.end_phase(TimingKeys::SYNTHESIZE);

        let collection_complete =
            report.all_steps_done() && !report.timed_out && report.tool_failures == 0;
        if !collection_complete {
            payload.status = RunStatus::Partial;
        }

        // 采集日志按步骤编号排列，合成日志追加在后
        let mut log = report.log;
        log.sort_by_key(|entry| entry.step_id.unwrap_or(usize::MAX));
        log.append(&mut payload.log);
        payload.log = log;

        info!(
            "✅ 调研完成：{} 个竞品，状态 {:?}，{} 条透明度日志",
            payload.competitors.len(),
            payload.status,
            payload.log.len()
        );
        info!("\n{}", timing.generate_timing_report());

        Ok(payload)
    }
}

/// 构造真实的工具网关与LLM客户端并执行调研，结果写入输出目录
pub async fn launch(config: &Config, request: &AnalysisRequest) -> Result<AnalysisPayload> {
    let tools = Arc::new(WebToolGateway::new(&config.tools, &config.collection)?);
    let mut pipeline = AnalysisPipeline::new(config.clone(), tools);

    if config.llm_available() {
        let client = LLMClient::new(&config.llm)?;
        // 启动时检查模型连接，失败时退化为启发式模式
        match client.check_connection().await {
            Ok(()) => pipeline = pipeline.with_llm(Arc::new(client)),
            Err(e) => warn!("⚠️ 模型不可用，使用启发式抽取与模板摘要: {}", e),
        }
    } else {
        info!("💡 未配置LLM，使用启发式抽取与模板摘要");
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️ 收到中断信号，结束采集并输出已有结果");
            on_interrupt.cancel();
        }
    });

    let payload = pipeline.run_analysis_with_cancel(request, cancel).await?;

    let mut timing = TimingScope::new();
    timing.start_phase(TimingKeys::OUTPUT);
    DiskOutlet::new(&config.output_path).save(&payload)?;
    if let Some(duration) = timing.end_phase(TimingKeys::OUTPUT) {
        info!("💾 报告输出耗时 {:.3}秒", duration.as_secs_f64());
    }

    Ok(payload)
}
