use crate::types::competitor::CompetitorRecord;
use crate::types::finding::FactField;
use crate::types::payload::PricingRow;
use crate::utils::signals::parse_prices;

/// 价格对比表，每个竞品一行，顺序与注册表一致
pub fn build_pricing_table(records: &[CompetitorRecord]) -> Vec<PricingRow> {
    records.iter().map(pricing_row).collect()
}

fn pricing_row(record: &CompetitorRecord) -> PricingRow {
    let pricing_model = record.value(FactField::PricingModel).map(str::to_string);
    let pricing_tiers = record.value(FactField::PricingTiers).map(str::to_string);
    let prices = pricing_tiers.as_deref().map(parse_prices).unwrap_or_default();

    let starting_price = prices
        .iter()
        .copied()
        .filter(|price| *price > 0.0)
        .min_by(f64::total_cmp);
    let mentions_free = |text: Option<&str>| {
        text.is_some_and(|t| {
            let lower = t.to_lowercase();
            lower.contains("free")
        })
    };
    let has_free_tier = prices.contains(&0.0)
        || mentions_free(pricing_tiers.as_deref())
        || mentions_free(pricing_model.as_deref());

    let source = record
        .winning(FactField::PricingTiers)
        .or_else(|| record.winning(FactField::PricingModel))
        .map(|fact| fact.provenance.clone());

    PricingRow {
        competitor: record.display_name().to_string(),
        pricing_model,
        pricing_tiers,
        starting_price,
        has_free_tier,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::finding::{CompetitorFact, RawFinding};

    #[test]
    fn test_pricing_row_from_tiers() {
        let page = RawFinding::scrape("https://asana.com/pricing", "");
        let snippet = RawFinding::search("https://example.com", "", "");
        let mut record = CompetitorRecord::new("asana", "Asana");
        record.merge(CompetitorFact::new(
            FactField::PricingTiers,
            "Personal: $0; Starter: $10.99/user/month; Advanced: $24.99/user/month",
            0.65,
            &page,
        ));
        record.merge(CompetitorFact::new(
            FactField::PricingModel,
            "Freemium, per-seat subscription",
            0.75,
            &snippet,
        ));

        let table = build_pricing_table(&[record]);
        assert_eq!(table.len(), 1);
        let row = &table[0];
        assert_eq!(row.competitor, "Asana");
        assert_eq!(row.starting_price, Some(10.99));
        assert!(row.has_free_tier);
        assert_eq!(row.source.as_deref(), Some("https://asana.com/pricing"));
    }

    #[test]
    fn test_pricing_row_without_data() {
        let table = build_pricing_table(&[CompetitorRecord::new("coda", "Coda")]);
        assert_eq!(
            table[0],
            PricingRow {
                competitor: "Coda".to_string(),
                pricing_model: None,
                pricing_tiers: None,
                starting_price: None,
                has_free_tier: false,
                source: None,
            }
        );
    }
}
