//! 结构化（模板）摘要，只依赖注册表中的数据

use std::collections::BTreeSet;

use crate::types::competitor::CompetitorRecord;
use crate::types::finding::FactField;
use crate::types::payload::ExecutiveSummary;
use crate::types::request::AnalysisRequest;
use crate::utils::signals::{parse_market_share, parse_revenue_billions};

struct Signal<'a> {
    name: &'a str,
    value: f64,
    raw: &'a str,
}

/// 按数值取最大项，数值相同时按名称，保证结果确定
fn top<'a, 'b>(signals: &'b [Signal<'a>]) -> Option<&'b Signal<'a>> {
    signals.iter().max_by(|a, b| {
        a.value
            .total_cmp(&b.value)
            .then_with(|| b.name.cmp(a.name))
    })
}

fn signals(
    records: &[CompetitorRecord],
    field: FactField,
    parse: fn(&str) -> Option<f64>,
) -> Vec<Signal<'_>> {
    records
        .iter()
        .filter_map(|record| {
            let raw = record.value(field)?;
            parse(raw).map(|value| Signal {
                name: record.display_name(),
                value,
                raw,
            })
        })
        .collect()
}

fn distinct_values(records: &[CompetitorRecord], field: FactField) -> usize {
    records
        .iter()
        .filter_map(|record| record.value(field))
        .map(|value| value.trim().to_lowercase())
        .collect::<BTreeSet<_>>()
        .len()
}

/// 根据竞品数据生成模板化执行摘要
pub fn template_summary(records: &[CompetitorRecord], request: &AnalysisRequest) -> ExecutiveSummary {
    let target = request.target.trim();
    let industry = request.industry_hint();
    let market = industry
        .map(|industry| format!("{} market", industry))
        .unwrap_or_else(|| "market".to_string());
    let count = records.len();

    let revenue = signals(records, FactField::Revenue, parse_revenue_billions);
    let shares = signals(records, FactField::MarketShare, parse_market_share);
    let pricing_models = distinct_values(records, FactField::PricingModel);
    let audiences = distinct_values(records, FactField::TargetAudience);

    let mut key_findings = vec![format!(
        "{} operates in a competitive {} with {} identified competitors.",
        target, market, count
    )];
    if let Some(leader) = top(&revenue) {
        let average = revenue.iter().map(|s| s.value).sum::<f64>() / revenue.len() as f64;
        key_findings.push(format!(
            "Revenue analysis: average competitor revenue is ${:.1}B, with {} leading at {}.",
            average, leader.name, leader.raw
        ));
    }
    if let Some(dominant) = top(&shares) {
        key_findings.push(format!(
            "Market concentration: {} dominates with {} market share.",
            dominant.name, dominant.raw
        ));
    }
    let priced = records
        .iter()
        .filter(|record| record.has_field(FactField::PricingModel))
        .count();
    if priced > 0 {
        key_findings.push(format!(
            "Pricing data was found for {} of {} competitors.",
            priced, count
        ));
    }

    let mut opportunities = Vec::new();
    if pricing_models > 1 {
        opportunities.push(format!(
            "Pricing diversification: competitors use {} different pricing approaches.",
            pricing_models
        ));
    }
    if audiences > 1 {
        opportunities.push(format!(
            "Market segmentation: competitors target {} distinct customer segments.",
            audiences
        ));
    }
    opportunities.extend([
        format!(
            "Technology differentiation: leverage {}'s unique capabilities.",
            target
        ),
        "Feature innovation: identify gaps in competitor offerings.".to_string(),
    ]);

    let mut threats = Vec::new();
    let high_share = shares.iter().filter(|s| s.value > 20.0).count();
    if high_share > 0 {
        threats.push(format!(
            "Market concentration: {} competitors hold significant market share (>20%).",
            high_share
        ));
    }
    threats.extend([
        format!(
            "Regulatory pressure: the {} faces increasing compliance requirements.",
            market
        ),
        "Technology disruption: rapid innovation creates constant competitive pressure.".to_string(),
        "Customer switching costs: established competitors have strong customer lock-in."
            .to_string(),
    ]);

    let mut recommendations = Vec::new();
    if let Some(leader) = top(&revenue) {
        recommendations.push(format!(
            "Revenue optimization: analyze the pricing strategy of top revenue generators like {}.",
            leader.name
        ));
    }
    if let Some(dominant) = top(&shares) {
        recommendations.push(format!(
            "Market positioning: focus on segments underserved by {}.",
            dominant.name
        ));
    }
    recommendations.extend([
        "Feature differentiation: build capabilities not offered by competitors.".to_string(),
        match industry {
            Some(industry) => format!(
                "Partnership strategy: explore alliances with complementary {} players.",
                industry
            ),
            None => "Partnership strategy: explore alliances with complementary players.".to_string(),
        },
        "Customer experience: focus on areas where competitors underperform.".to_string(),
    ]);

    let mut market_position = format!(
        "{} competes in the {} against {} identified players. ",
        target, market, count
    );
    if let (Some(low), Some(high)) = (
        revenue.iter().map(|s| s.value).min_by(f64::total_cmp),
        revenue.iter().map(|s| s.value).max_by(f64::total_cmp),
    ) {
        market_position.push_str(&format!(
            "Competitor revenue ranges from ${:.1}B to ${:.1}B. ",
            low, high
        ));
    }
    if !shares.is_empty() {
        let leading: Vec<&str> = shares.iter().take(2).map(|s| s.raw).collect();
        market_position.push_str(&format!(
            "Top players hold {} market share. ",
            leading.join(", ")
        ));
    }
    market_position.push_str(&format!(
        "Competitors use {} different pricing models and target {} distinct segments.",
        pricing_models, audiences
    ));

    ExecutiveSummary {
        market_position,
        key_findings,
        opportunities,
        threats,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::finding::{CompetitorFact, RawFinding};
    use crate::types::request::AnalysisType;

    fn record(name: &str, facts: &[(FactField, &str)]) -> CompetitorRecord {
        let finding = RawFinding::search("https://example.com", "", "");
        let mut record = CompetitorRecord::new(&name.to_lowercase(), name);
        for (field, value) in facts {
            record.merge(CompetitorFact::new(*field, value, 0.6, &finding));
        }
        record
    }

    #[test]
    fn test_summary_uses_revenue_and_share_signals() {
        let records = vec![
            record(
                "Visa",
                &[
                    (FactField::Revenue, "$32.7B"),
                    (FactField::MarketShare, "52.0%"),
                    (FactField::PricingModel, "Per transaction"),
                ],
            ),
            record(
                "Adyen",
                &[
                    (FactField::Revenue, "$1.9B"),
                    (FactField::MarketShare, "4.5%"),
                    (FactField::PricingModel, "Usage-based"),
                ],
            ),
        ];
        let request = AnalysisRequest::new("Stripe", AnalysisType::Full).with_industry("payments");
        let summary = template_summary(&records, &request);

        assert_eq!(
            summary.key_findings[0],
            "Stripe operates in a competitive payments market with 2 identified competitors."
        );
        assert!(summary.key_findings[1].contains("Visa leading at $32.7B"));
        assert!(summary.key_findings[2].contains("Visa dominates with 52.0%"));
        assert!(summary.market_position.contains("from $1.9B to $32.7B"));
        assert!(summary.threats[0].contains("1 competitors hold significant market share"));
        assert!(summary.opportunities[0].contains("2 different pricing approaches"));
        assert!(summary.recommendations.iter().any(|r| r.contains("payments players")));
    }

    #[test]
    fn test_summary_without_signals_only_names_records() {
        let records = vec![record("Asana", &[])];
        let request = AnalysisRequest::new("Notion", AnalysisType::Market);
        let summary = template_summary(&records, &request);

        assert_eq!(summary.key_findings.len(), 1);
        assert!(summary.texts().all(|text| !text.contains("Trello")));
        assert!(summary.market_position.starts_with("Notion competes in the market"));
        assert_eq!(template_summary(&records, &request), summary);
    }
}
