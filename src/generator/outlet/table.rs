//! 竞品平面表（CSV导出）

use crate::types::finding::FactField;
use crate::types::payload::{AnalysisPayload, CompetitorView};

/// 导出列，顺序固定
pub const COLUMNS: [FactField; 9] = [
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

/// RFC 4180 字段转义
fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn row(competitor: &CompetitorView) -> String {
    COLUMNS
        .iter()
        .map(|&field| match field {
            FactField::Name => escape(&competitor.name),
            _ => escape(competitor.value(field).unwrap_or_default()),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// 每个竞品一行，缺失字段留空
pub fn render_csv(payload: &AnalysisPayload) -> String {
    let header = COLUMNS
        .iter()
        .map(FactField::as_str)
        .collect::<Vec<_>>()
        .join(",");
    let mut csv = header;
    csv.push_str("\r\n");
    for competitor in &payload.competitors {
        csv.push_str(&row(competitor));
        csv.push_str("\r\n");
    }
    csv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::competitor::CompetitorRecord;
    use crate::types::finding::{CompetitorFact, RawFinding};

    #[test]
    fn test_escape_quotes_and_separators() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("tasks, docs"), "\"tasks, docs\"");
        assert_eq!(escape("the \"best\" tool"), "\"the \"\"best\"\" tool\"");
        assert_eq!(escape("line\nbreak"), "\"line\nbreak\"");
    }

    #[test]
    fn test_row_keeps_fixed_column_order() {
        let finding = RawFinding::search("https://asana.com", "", "");
        let mut record = CompetitorRecord::new("asana", "Asana");
        record.merge(CompetitorFact::new(FactField::KeyFeatures, "tasks, automation", 0.6, &finding));
        record.merge(CompetitorFact::new(FactField::Revenue, "$0.7B", 0.55, &finding));

        let line = row(&CompetitorView::from(&record));
        assert_eq!(line, "Asana,,,,\"tasks, automation\",,,$0.7B,");
    }
}
