//! 功能词表与三态功能矩阵

use crate::types::competitor::CompetitorRecord;
use crate::types::finding::FactField;
use crate::types::payload::{FeatureMatrix, FeatureRow, FeatureSupport};
use crate::utils::signals::mentions;

/// 词表中的一个功能：关键词命中为full，近义词命中为partial
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTerm {
    pub label: String,
    pub keywords: Vec<String>,
    pub synonyms: Vec<String>,
    /// 请求中显式关注的功能，即使无人支持也保留在矩阵中
    pub pinned: bool,
}

impl FeatureTerm {
    fn new(label: &str, keywords: &[&str], synonyms: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
            pinned: false,
        }
    }

    /// 按文本判断支持程度
    pub fn classify<'a>(&self, texts: impl IntoIterator<Item = &'a str> + Clone) -> FeatureSupport {
        let hit = |terms: &[String]| {
            texts
                .clone()
                .into_iter()
                .any(|text| terms.iter().any(|term| mentions(text, term)))
        };
        if hit(&self.keywords) {
            FeatureSupport::Full
        } else if hit(&self.synonyms) {
            FeatureSupport::Partial
        } else {
            FeatureSupport::None
        }
    }
}

/// 固定功能词表
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVocabulary {
    terms: Vec<FeatureTerm>,
}

impl Default for FeatureVocabulary {
    fn default() -> Self {
        Self::standard()
    }
}

impl FeatureVocabulary {
    pub fn standard() -> Self {
        let terms = vec![
            FeatureTerm::new("API", &["api", "rest api", "sdk"], &["webhooks", "developer platform"]),
            FeatureTerm::new(
                "Mobile app",
                &["mobile app", "mobile apps", "ios", "android"],
                &["mobile", "on the go"],
            ),
            FeatureTerm::new(
                "Analytics & reporting",
                &["analytics", "reporting", "reports", "dashboards"],
                &["insights", "metrics", "charts"],
            ),
            FeatureTerm::new(
                "Integrations",
                &["integrations", "integration"],
                &["connectors", "zapier", "plugins", "add-ons"],
            ),
            FeatureTerm::new(
                "Collaboration",
                &["collaboration", "real-time collaboration"],
                &["sharing", "comments", "teamwork"],
            ),
            FeatureTerm::new(
                "Automation",
                &["automation", "automations", "workflow automation"],
                &["workflows", "rules", "triggers"],
            ),
            FeatureTerm::new("Templates", &["templates"], &["blueprints", "presets"]),
            FeatureTerm::new(
                "Task management",
                &["task management", "tasks", "to-do"],
                &["kanban", "boards", "checklists"],
            ),
            FeatureTerm::new(
                "Project management",
                &["project management", "projects"],
                &["gantt charts", "timelines", "roadmaps", "portfolios"],
            ),
            FeatureTerm::new(
                "Docs & knowledge base",
                &["docs", "wiki", "wikis", "knowledge base"],
                &["notes", "documents"],
            ),
            FeatureTerm::new(
                "Payment processing",
                &["payment processing", "payments"],
                &["checkout", "card processing"],
            ),
            FeatureTerm::new(
                "Fraud protection",
                &["fraud protection", "fraud detection"],
                &["risk management", "radar"],
            ),
            FeatureTerm::new(
                "Multi-currency",
                &["multi-currency", "multiple currencies"],
                &["international payments", "currencies"],
            ),
            FeatureTerm::new(
                "Subscription billing",
                &["subscription billing", "recurring billing"],
                &["invoicing", "billing"],
            ),
            FeatureTerm::new(
                "E-commerce",
                &["e-commerce", "ecommerce", "online store"],
                &["storefront", "shopping cart"],
            ),
            FeatureTerm::new(
                "AI assistant",
                &["ai assistant", "ai", "copilot"],
                &["machine learning", "generative", "assistant"],
            ),
            FeatureTerm::new(
                "Security & SSO",
                &["sso", "single sign-on", "security"],
                &["encryption", "saml", "permissions", "compliance"],
            ),
            FeatureTerm::new(
                "Customer support",
                &["customer support", "live chat", "help desk"],
                &["support", "ticketing", "chat"],
            ),
        ];
        Self { terms }
    }

    /// 合并请求中的功能提示：已在词表中的功能置顶，其余作为新功能加入
    pub fn with_hints(mut self, hints: &[String]) -> Self {
        let mut pinned: Vec<FeatureTerm> = Vec::new();
        for hint in hints {
            let hint = hint.trim().to_lowercase();
            if hint.is_empty() || pinned.iter().any(|term| term.keywords.contains(&hint)) {
                continue;
            }
            let existing = self.terms.iter().position(|term| {
                term.label.to_lowercase() == hint || term.keywords.contains(&hint)
            });
            let mut term = match existing {
                Some(index) => self.terms.remove(index),
                None => {
                    let words: Vec<&str> = hint
                        .split_whitespace()
                        .filter(|word| word.chars().count() >= 4)
                        .collect();
                    let synonyms = if words.len() > 1 { words } else { Vec::new() };
                    FeatureTerm::new(&hint, &[hint.as_str()], &synonyms)
                }
            };
            term.pinned = true;
            pinned.push(term);
        }
        pinned.append(&mut self.terms);
        Self { terms: pinned }
    }

    pub fn terms(&self) -> &[FeatureTerm] {
        &self.terms
    }

    /// 构建功能矩阵：只保留置顶功能以及至少一个竞品支持的功能
    pub fn build_matrix(&self, records: &[CompetitorRecord]) -> FeatureMatrix {
        let grid: Vec<Vec<FeatureSupport>> = records
            .iter()
            .map(|record| {
                let texts: Vec<&str> = record
                    .all_values(FactField::KeyFeatures)
                    .chain(record.all_values(FactField::Description))
                    .collect();
                self.terms
                    .iter()
                    .map(|term| term.classify(texts.iter().copied()))
                    .collect()
            })
            .collect();

        let columns: Vec<usize> = (0..self.terms.len())
            .filter(|&column| {
                self.terms[column].pinned
                    || grid.iter().any(|row| row[column] != FeatureSupport::None)
            })
            .collect();

        FeatureMatrix {
            features: columns
                .iter()
                .map(|&column| self.terms[column].label.clone())
                .collect(),
            rows: records
                .iter()
                .zip(grid)
                .map(|(record, cells)| FeatureRow {
                    competitor: record.display_name().to_string(),
                    cells: columns.iter().map(|&column| cells[column]).collect(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::finding::{CompetitorFact, RawFinding};

    fn record(name: &str, features: &str, description: &str) -> CompetitorRecord {
        let finding = RawFinding::search("https://example.com", "", "");
        let mut record = CompetitorRecord::new(&name.to_lowercase(), name);
        if !features.is_empty() {
            record.merge(CompetitorFact::new(FactField::KeyFeatures, features, 0.6, &finding));
        }
        if !description.is_empty() {
            record.merge(CompetitorFact::new(FactField::Description, description, 0.6, &finding));
        }
        record
    }

    #[test]
    fn test_tri_state_classification() {
        let vocabulary = FeatureVocabulary::standard();
        let records = vec![
            record("Asana", "task management, automation, reporting", ""),
            record("Trello", "kanban boards", "Trello is a visual tool."),
        ];
        let matrix = vocabulary.build_matrix(&records);

        assert_eq!(matrix.cell("Asana", "Task management"), Some(FeatureSupport::Full));
        assert_eq!(matrix.cell("Trello", "Task management"), Some(FeatureSupport::Partial));
        assert_eq!(matrix.cell("Trello", "Automation"), Some(FeatureSupport::None));
        assert_eq!(matrix.cell("Asana", "Analytics & reporting"), Some(FeatureSupport::Full));
        // 无人支持的功能不出现在矩阵中
        assert!(!matrix.features.contains(&"Fraud protection".to_string()));
    }

    #[test]
    fn test_hints_are_pinned_first() {
        let vocabulary = FeatureVocabulary::standard()
            .with_hints(&["automation".to_string(), "offline mode".to_string()]);
        assert_eq!(vocabulary.terms()[0].label, "Automation");
        assert_eq!(vocabulary.terms()[1].label, "offline mode");

        let matrix = vocabulary.build_matrix(&[record("Asana", "timeline", "")]);
        assert_eq!(matrix.features, vec!["Automation", "offline mode"]);
        assert_eq!(matrix.cell("Asana", "offline mode"), Some(FeatureSupport::None));
    }

    #[test]
    fn test_matrix_is_deterministic() {
        let vocabulary = FeatureVocabulary::standard();
        let records = vec![record("Stripe", "payments, fraud protection, api", "Stripe is a payments platform.")];
        assert_eq!(vocabulary.build_matrix(&records), vocabulary.build_matrix(&records));
    }
}
