//! LLM辅助叙述生成与实体校验

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::generator::research::normalizer::heuristic::{
    GENERIC_WORDS, clean_candidate, looks_like_company_name,
};
use crate::generator::research::registry::{identities_match, identity_key};
use crate::llm::{CompletionPrompt, LanguageModel, extract};
use crate::types::competitor::CompetitorRecord;
use crate::types::finding::FactField;
use crate::types::payload::ExecutiveSummary;
use crate::types::request::AnalysisRequest;
use crate::utils::signals::{mentions, sentences};

/// 叙述中常以大写形式出现、但不是公司名的普通词
const ORDINARY_WORDS: &[&str] = &[
    "also", "although", "as", "because", "but", "both", "each", "every", "all", "any", "some",
    "many", "most", "several", "few", "no", "not", "if", "when", "where", "while", "since", "so",
    "yet", "then", "thus", "however", "overall", "meanwhile", "additionally", "furthermore",
    "moreover", "instead", "despite", "given", "unlike", "compared", "relative", "there", "here",
    "those", "their", "he", "she", "his", "her", "at", "from", "into", "over", "under", "among",
    "against", "across", "between", "about", "after", "before", "during", "than", "only", "still",
    "customers", "customer", "users", "user", "teams", "team", "buyers", "revenue", "growth",
    "competition", "threat", "threats", "opportunity", "opportunities", "recommendation",
    "recommendations", "findings", "finding", "key", "strong", "weak", "high", "low", "premium",
    "enterprise", "enterprises", "paid", "freemium", "small", "large", "mid", "smbs", "startups",
    "businesses", "data", "product", "products", "feature", "integration", "integrations",
    "automation", "analytics", "collaboration", "mobile", "saas", "markets", "segment",
    "segments", "share", "position", "focus", "consider", "invest", "expand", "lead", "leverage",
    "build", "offer", "add", "adopt", "bundle", "launch", "partner", "improve", "strengthen",
    "reduce", "create", "develop", "explore", "highlight", "monitor", "target", "prioritize",
    "emphasize", "double", "win", "keep", "maintain", "continue", "use", "deliver", "grow",
    "extend", "introduce", "streamline", "simplify", "differentiate", "capture", "attract",
    "retain", "defend", "watch", "track", "push", "ensure", "raise", "lower", "match",
    "undercut", "january", "february", "march", "april", "may", "june", "july", "august",
    "september", "october", "november", "december",
];

/// 句首单词带这些后缀时视为普通词
const ORDINARY_SUFFIXES: &[&str] = &[
    "ing", "ed", "ly", "tion", "sion", "ment", "ness", "ity", "ize", "ise", "ate", "ive", "ous",
    "ful", "able", "ible", "ance", "ence",
];

/// 一段连续的首字母大写单词
struct CapitalizedRun {
    words: Vec<String>,
    sentence_initial: bool,
}

/// 切出文本中连续的首字母大写单词，逗号等标点与小写词会截断片段
fn capitalized_runs(text: &str) -> Vec<CapitalizedRun> {
    let mut runs = Vec::new();
    for sentence in sentences(text) {
        let mut current: Option<CapitalizedRun> = None;
        for (index, raw) in sentence.split_whitespace().enumerate() {
            let word = clean_candidate(raw);
            let word = word
                .strip_suffix("'s")
                .or_else(|| word.strip_suffix("\u{2019}s"))
                .unwrap_or(word);
            if word.chars().next().is_some_and(char::is_uppercase) {
                current
                    .get_or_insert_with(|| CapitalizedRun {
                        words: Vec::new(),
                        sentence_initial: index == 0,
                    })
                    .words
                    .push(word.to_string());
            } else {
                runs.extend(current.take());
            }
            if raw.ends_with([',', ';', ':', ')', '"']) {
                runs.extend(current.take());
            }
        }
        runs.extend(current.take());
    }
    runs
}

fn is_ordinary_word(word: &str, sentence_initial: bool) -> bool {
    let lower = word.to_lowercase();
    let letters: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    if letters.len() < 2 {
        return true;
    }
    if ORDINARY_WORDS.contains(&lower.as_str()) || GENERIC_WORDS.contains(&lower.as_str()) {
        return true;
    }
    // AI、API、CRM等缩写
    if letters.len() <= 4 && letters.iter().all(|c| c.is_uppercase()) {
        return true;
    }
    // AI-powered这类复合词
    if word.contains('-')
        && word
            .split('-')
            .any(|part| part.chars().next().is_some_and(char::is_lowercase))
    {
        return true;
    }
    sentence_initial
        && ORDINARY_SUFFIXES
            .iter()
            .any(|suffix| lower.len() > suffix.len() + 2 && lower.ends_with(suffix))
}

/// 模型输出的叙述草稿
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NarrativeDraft {
    /// 目标在市场中的定位，2-4句话
    pub market_position: String,
    pub key_findings: Vec<String>,
    pub opportunities: Vec<String>,
    pub threats: Vec<String>,
    pub recommendations: Vec<String>,
    /// 叙述中提到的全部竞品名称
    pub referenced_competitors: Vec<String>,
}

impl NarrativeDraft {
    fn into_summary(self) -> ExecutiveSummary {
        let clean = |items: Vec<String>| -> Vec<String> {
            items
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        };
        ExecutiveSummary {
            market_position: self.market_position.trim().to_string(),
            key_findings: clean(self.key_findings),
            opportunities: clean(self.opportunities),
            threats: clean(self.threats),
            recommendations: clean(self.recommendations),
        }
    }
}

/// 叙述校验上下文：允许出现的实体与禁止出现的名称
pub struct NarrativeGuard<'a> {
    pub records: &'a [CompetitorRecord],
    pub target: &'a str,
    /// 识别阶段见过但未被采用的候选名
    pub excluded_names: &'a [String],
    pub match_ratio: f64,
}

impl NarrativeGuard<'_> {
    fn is_known(&self, name: &str) -> bool {
        let key = identity_key(name);
        if key.is_empty() {
            return false;
        }
        identities_match(&key, &identity_key(self.target), self.match_ratio)
            || self
                .records
                .iter()
                .any(|record| identities_match(&key, &record.identity_key, self.match_ratio))
    }

    /// 校验草稿，返回拒绝原因
    pub fn validate(&self, draft: NarrativeDraft) -> Result<ExecutiveSummary, String> {
        let unknown: Vec<&str> = draft
            .referenced_competitors
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty() && !self.is_known(name))
            .collect();
        if !unknown.is_empty() {
            return Err(format!(
                "narrative references competitors absent from the dataset: {}",
                unknown.join(", ")
            ));
        }

        let summary = draft.into_summary();
        if summary.market_position.is_empty() || summary.key_findings.is_empty() {
            return Err("narrative is missing market position or key findings".to_string());
        }
        let leaked: Vec<&str> = self
            .excluded_names
            .iter()
            .map(String::as_str)
            .filter(|name| !self.is_known(name))
            .filter(|name| summary.texts().any(|text| mentions(text, name)))
            .collect();
        if !leaked.is_empty() {
            return Err(format!(
                "narrative mentions companies that are not in the dataset: {}",
                leaked.join(", ")
            ));
        }

        // 模型未声明但在正文中出现的公司名同样拒绝
        let undeclared = self.unlisted_entities(&summary);
        if !undeclared.is_empty() {
            return Err(format!(
                "narrative names companies absent from the dataset: {}",
                undeclared.join(", ")
            ));
        }
        Ok(summary)
    }

    /// 扫描叙述正文中既不在数据集、也不是目标或普通词的公司名
    fn unlisted_entities(&self, summary: &ExecutiveSummary) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for run in summary.texts().flat_map(capitalized_runs) {
            if self.is_known(&run.words.join(" ")) {
                continue;
            }
            let unknown: Vec<&str> = run
                .words
                .iter()
                .enumerate()
                .filter(|(index, word)| {
                    !self.is_known(word)
                        && !is_ordinary_word(word, run.sentence_initial && *index == 0)
                })
                .map(|(_, word)| word.as_str())
                .collect();
            if unknown.is_empty() {
                continue;
            }
            let name = unknown.join(" ");
            let key = identity_key(&name);
            if looks_like_company_name(&name) && !found.iter().any(|f| identity_key(f) == key) {
                found.push(name);
            }
        }
        found
    }

    pub fn allowed_names(&self) -> Vec<&str> {
        self.records.iter().map(CompetitorRecord::display_name).collect()
    }
}

fn record_digest(record: &CompetitorRecord) -> serde_json::Value {
    let fields: serde_json::Map<String, serde_json::Value> = FactField::ALL
        .into_iter()
        .filter(|field| *field != FactField::Name)
        .filter_map(|field| {
            record
                .value(field)
                .map(|value| (field.to_string(), json!(value)))
        })
        .collect();
    json!({ "name": record.display_name(), "facts": fields })
}

/// 构造叙述生成的提示词，结构化摘要作为参考上下文
pub fn narrative_prompt(
    records: &[CompetitorRecord],
    request: &AnalysisRequest,
    structural: &ExecutiveSummary,
    correction: Option<&str>,
    guard: &NarrativeGuard<'_>,
) -> CompletionPrompt {
    let system = "You are a competitive-intelligence analyst. Write an executive summary \
        using ONLY the competitor data provided. Never mention companies that are not in the \
        provided list, and never invent facts, numbers or prices. List every competitor you \
        mention in referenced_competitors.";

    let digest: Vec<serde_json::Value> = records.iter().map(record_digest).collect();
    let mut user = format!(
        "Target: {}\nIndustry: {}\nTarget audience: {}\nAnalysis type: {}\n\nAllowed competitors: {}\n\nCompetitor data:\n{}\n\nStructural summary for reference:\n{}",
        request.target.trim(),
        request.industry_hint().unwrap_or("unspecified"),
        request.audience_hint().unwrap_or("unspecified"),
        request.analysis_type,
        guard.allowed_names().join(", "),
        serde_json::to_string_pretty(&digest).unwrap_or_default(),
        serde_json::to_string_pretty(structural).unwrap_or_default(),
    );
    if let Some(reason) = correction {
        user.push_str(&format!(
            "\n\nYour previous answer was rejected: {}. Only reference the allowed competitors listed above.",
            reason
        ));
    }
    CompletionPrompt::new(system, user)
}

/// 调用模型生成叙述草稿
pub async fn draft_narrative(
    model: &dyn LanguageModel,
    prompt: &CompletionPrompt,
) -> Result<NarrativeDraft, crate::error::LlmError> {
    extract::<NarrativeDraft>(model, prompt).await
}
