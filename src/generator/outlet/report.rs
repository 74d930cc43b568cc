//! Markdown报告渲染，只读取载荷中的值

use crate::types::payload::{AnalysisPayload, LogLevel, NarrativeSource, RunStatus};

fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn push_list(markdown: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    markdown.push_str(&format!("### {}\n\n", title));
    for item in items {
        markdown.push_str(&format!("- {}\n", item));
    }
    markdown.push('\n');
}

fn push_summary(markdown: &mut String, payload: &AnalysisPayload) {
    let summary = &payload.summary;
    markdown.push_str("## Executive summary\n\n");
    markdown.push_str(&format!("{}\n\n", summary.market_position));
    push_list(markdown, "Key findings", &summary.key_findings);
    push_list(markdown, "Opportunities", &summary.opportunities);
    push_list(markdown, "Threats", &summary.threats);
    push_list(markdown, "Recommendations", &summary.recommendations);
}

fn push_feature_matrix(markdown: &mut String, payload: &AnalysisPayload) {
    let matrix = &payload.feature_matrix;
    markdown.push_str("## Feature matrix\n\n");
    if matrix.features.is_empty() {
        markdown.push_str("No feature data was collected.\n\n");
        return;
    }
    markdown.push_str(&format!(
        "| Competitor | {} |\n",
        matrix
            .features
            .iter()
            .map(|feature| cell(feature))
            .collect::<Vec<_>>()
            .join(" | ")
    ));
    markdown.push_str(&format!("|---|{}\n", "---|".repeat(matrix.features.len())));
    for row in &matrix.rows {
        let cells: Vec<&str> = row.cells.iter().map(|support| support.symbol()).collect();
        markdown.push_str(&format!("| {} | {} |\n", cell(&row.competitor), cells.join(" | ")));
    }
    markdown.push_str("\n● full ◐ partial ○ none\n\n");
}

fn push_pricing(markdown: &mut String, payload: &AnalysisPayload) {
    markdown.push_str("## Pricing\n\n");
    markdown.push_str("| Competitor | Model | Tiers | Starting price | Free tier | Source |\n");
    markdown.push_str("|---|---|---|---|---|---|\n");
    for row in &payload.pricing_table {
        markdown.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} |\n",
            cell(&row.competitor),
            cell(row.pricing_model.as_deref().unwrap_or("-")),
            cell(row.pricing_tiers.as_deref().unwrap_or("-")),
            row.starting_price
                .map(|price| format!("${:.2}", price))
                .unwrap_or_else(|| "-".to_string()),
            if row.has_free_tier { "yes" } else { "no" },
            cell(row.source.as_deref().unwrap_or("-")),
        ));
    }
    markdown.push('\n');
}

fn push_log(markdown: &mut String, payload: &AnalysisPayload) {
    markdown.push_str("## Transparency log\n\n");
    if payload.log.is_empty() {
        markdown.push_str("No issues were recorded during this run.\n");
        return;
    }
    for entry in &payload.log {
        let level = match entry.level {
            LogLevel::Info => "info",
            LogLevel::Warning => "warning",
            LogLevel::Error => "error",
        };
        let scope = match (entry.step_id, entry.competitor.as_deref()) {
            (Some(step), Some(competitor)) => format!(" step {} ({})", step, competitor),
            (Some(step), None) => format!(" step {}", step),
            _ => String::new(),
        };
        markdown.push_str(&format!(
            "- **{}** `{:?}`{}: {}\n",
            level, entry.kind, scope, entry.message
        ));
    }
}

pub fn render_markdown(payload: &AnalysisPayload) -> String {
    let mut markdown = format!(
        "# Competitive analysis: {}\n\n",
        payload.request.target.trim()
    );
    markdown.push_str(&format!(
        "Analysis type: {} · Generated: {} · Status: {} · Narrative: {}\n\n",
        payload.request.analysis_type,
        payload.generated_at.format("%Y-%m-%d %H:%M UTC"),
        match payload.status {
            RunStatus::Complete => "complete",
            RunStatus::Partial => "partial",
        },
        match payload.narrative_source {
            NarrativeSource::Llm => "llm",
            NarrativeSource::Template => "template",
        },
    ));

    push_summary(&mut markdown, payload);
    push_feature_matrix(&mut markdown, payload);
    push_pricing(&mut markdown, payload);
    push_log(&mut markdown, payload);
    markdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::compose::Synthesizer;
    use crate::types::competitor::CompetitorRecord;
    use crate::types::finding::{CompetitorFact, FactField, RawFinding};
    use crate::types::payload::{LogEntry, LogKind};
    use crate::types::request::{AnalysisRequest, AnalysisType};

    #[tokio::test]
    async fn test_markdown_contains_tables_and_log() {
        let finding = RawFinding::scrape("https://asana.com/pricing", "");
        let mut asana = CompetitorRecord::new("asana", "Asana");
        asana.merge(CompetitorFact::new(FactField::KeyFeatures, "automation", 0.6, &finding));
        asana.merge(CompetitorFact::new(
            FactField::PricingTiers,
            "Personal: $0; Starter: $10.99/user/month",
            0.6,
            &finding,
        ));
        let request = AnalysisRequest::new("Notion", AnalysisType::Full);
        let mut payload = Synthesizer::new(None).synthesize(&[asana], &request).await;
        payload.log.push(
            LogEntry::new(LogLevel::Error, LogKind::ToolFailure, "fetch failed").for_step(2, Some("Asana")),
        );

        let markdown = render_markdown(&payload);
        assert!(markdown.contains("| Competitor | Automation |"));
        assert!(markdown.contains("| Asana | ● |"));
        assert!(markdown.contains("$10.99"));
        assert!(markdown.contains("- **error** `ToolFailure` step 2 (Asana): fetch failed"));
    }
}
