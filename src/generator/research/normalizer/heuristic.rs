//! 基于模式与关键词的启发式抽取

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::ExtractionStrategy;
use crate::generator::research::registry::{LEGAL_SUFFIXES, identity_key};
use crate::types::finding::{CompetitorFact, FactField, RawFinding, SourceKind};
use crate::utils::signals::{
    format_billions, host_matches, mentions, parse_market_share, parse_revenue_billions, sentences,
};

/// 不可能是公司名的常见词
pub const GENERIC_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "of", "for", "in", "to", "with", "on", "by", "is", "are", "it",
    "its", "this", "that", "these", "they", "we", "you", "your", "our", "how", "what", "why",
    "which", "who", "best", "top", "free", "new", "more", "other", "vs", "versus", "compare",
    "comparison", "review", "reviews", "alternative", "alternatives", "competitor", "competitors",
    "pricing", "price", "prices", "plans", "plan", "software", "tool", "tools", "app", "apps",
    "management", "platform", "platforms", "solution", "solutions", "company", "companies",
    "overview", "features", "guide", "list", "market", "official", "site", "home", "login",
    "sign", "blog", "news", "wikipedia", "reddit", "pros", "cons",
];

/// 标题中分隔多个实体的分隔符
const TITLE_SEPARATORS: &[&str] = &[" - ", " – ", " — ", " | ", ": ", " vs. ", " vs ", " versus ", ", "];

/// 评测与聚合站点，常作为榜单标题末尾的站点名出现
const REVIEW_SITES: &[&str] = &[
    "g2", "capterra", "getapp", "software advice", "trustradius", "gartner", "forbes",
    "forbes advisor", "pcmag", "techradar", "zdnet", "cnet", "techcrunch", "the verge",
    "product hunt", "producthunt", "alternativeto", "sourceforge", "slashdot", "saasworthy",
    "crunchbase", "similarweb", "nerdwallet", "investopedia", "business insider", "medium",
    "youtube", "linkedin", "quora", "clutch", "tech co",
];

/// 标题含这些词时视为榜单或对比页面
const LISTING_MARKERS: &[&str] = &[
    "alternative", "competitor", "best ", "top ", " vs", "compare", "comparison", "review",
];

/// 列表前导短语，其后通常跟随若干公司名
const LIST_LEAD_INS: &[&str] = &["such as ", "including ", "like ", "include ", "e.g. "];

const FEATURE_LEXICON: &[&str] = &[
    "task management",
    "project management",
    "api",
    "integrations",
    "automation",
    "automations",
    "analytics",
    "reporting",
    "dashboards",
    "collaboration",
    "templates",
    "mobile app",
    "time tracking",
    "docs",
    "wikis",
    "kanban",
    "gantt charts",
    "payment processing",
    "subscription billing",
    "invoicing",
    "fraud protection",
    "multi-currency",
    "sso",
    "ai assistant",
    "workflows",
    "crm",
];

const POSITION_KEYWORDS: &[&str] = &[
    "market leader",
    "leader",
    "leading",
    "largest",
    "most popular",
    "fastest-growing",
    "fastest growing",
    "dominant",
    "number one",
    "#1",
    "challenger",
    "niche",
];

const REVENUE_KEYWORDS: &[&str] = &["revenue", "arr", "annual recurring", "sales", "turnover"];

const DESCRIPTION_VERBS: &[&str] = &[
    " is ", " provides ", " offers ", " helps ", " lets ", " enables ", " builds ",
];

static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid year regex"));

static FEATURE_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:features? include|key features(?: are)?|capabilities include|offers|including|such as)[:\s]+([^.\n]+)",
    )
    .expect("valid feature list regex")
});

static AUDIENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:designed for|built for|made for|ideal for|perfect for|used by|for)\s+((?:[a-z0-9&-]+\s+){0,4}?(?:teams|businesses|companies|enterprises|startups|developers|freelancers|individuals|organizations|agencies|marketers|creators|students|professionals|small businesses|smbs))\b",
    )
    .expect("valid audience regex")
});

static PRICING_TIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(free|basic|starter|standard|plus|pro|premium|professional|business|team|teams|growth|advanced|enterprise|unlimited|personal|individual|essentials?)\b[^$\n]{0,40}?\$\s?(\d[\d,]*(?:\.\d{1,2})?)((?:\s*(?:/|per\s+)\s*(?:user|seat|member|month|mo|year|yr)){0,2})",
    )
    .expect("valid pricing tier regex")
});

/// 判断一段文本是否像公司名：1-3个词，首字母大写或为域名，且不含泛化词和年份
pub fn looks_like_company_name(candidate: &str) -> bool {
    let candidate = clean_candidate(candidate);
    let char_count = candidate.chars().count();
    if !(2..=40).contains(&char_count) || !candidate.chars().any(char::is_alphabetic) {
        return false;
    }
    let words: Vec<&str> = candidate.split_whitespace().collect();
    if words.is_empty() || words.len() > 3 {
        return false;
    }
    if YEAR.is_match(candidate) {
        return false;
    }
    // "Stripe, Inc." 按逗号拆分后残留的后缀
    if words.len() == 1 && LEGAL_SUFFIXES.contains(&words[0].to_lowercase().as_str()) {
        return false;
    }
    let starts_upper = words[0].chars().next().is_some_and(char::is_uppercase);
    let is_domain = words.len() == 1
        && words[0]
            .rsplit_once('.')
            .is_some_and(|(head, tld)| !head.is_empty() && tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_lowercase()));
    if !starts_upper && !is_domain {
        return false;
    }
    words.iter().all(|word| {
        let lower = word.to_lowercase();
        !GENERIC_WORDS.contains(&lower.as_str()) && !word.chars().all(|c| c.is_ascii_digit())
    })
}

/// 是否为评测或聚合站点的名称
pub fn is_review_site(candidate: &str) -> bool {
    REVIEW_SITES.contains(&identity_key(candidate).as_str())
}

/// 去掉候选名两端的标点与引号
pub fn clean_candidate(candidate: &str) -> &str {
    candidate
        .trim()
        .trim_start_matches("and ")
        .trim_start_matches("or ")
        .trim_matches(|c: char| !c.is_alphanumeric() && c != '&' && c != '+')
}

/// 文本是否能归属到指定竞品：提及其名称或来源主机名匹配
pub fn is_attributable(finding: &RawFinding, subject: &str) -> bool {
    mentions(&finding.full_text(), subject) || host_matches(&finding.source, &identity_key(subject))
}

/// 启发式抽取策略，覆盖全部字段
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicExtractor;

#[async_trait]
impl ExtractionStrategy for HeuristicExtractor {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn supports(&self, _field: FactField) -> bool {
        true
    }

    async fn extract(
        &self,
        finding: &RawFinding,
        subject: Option<&str>,
        fields: &[FactField],
    ) -> Vec<CompetitorFact> {
        let mut facts = Vec::new();
        if fields.contains(&FactField::Name) {
            facts.extend(extract_names(finding));
        }
        let Some(subject) = subject else {
            return facts;
        };
        if !is_attributable(finding, subject) {
            return facts;
        }
        let from_host = host_matches(&finding.source, &identity_key(subject));

        for field in fields {
            let fact = match field {
                FactField::Name => None,
                FactField::Description => extract_description(finding, subject),
                FactField::PricingModel => extract_pricing_model(finding),
                FactField::PricingTiers => extract_pricing_tiers(finding),
                FactField::KeyFeatures => extract_key_features(finding),
                FactField::MarketPosition => extract_market_position(finding, subject, from_host),
                FactField::TargetAudience => extract_target_audience(finding),
                FactField::Revenue => extract_revenue(finding, subject, from_host),
                FactField::MarketShare => extract_market_share(finding, subject, from_host),
            };
            facts.extend(fact);
        }
        facts
    }
}

/// 从标题分段和摘要中的枚举列表提取公司名
pub fn extract_names(finding: &RawFinding) -> Vec<CompetitorFact> {
    let mut names: Vec<(String, f64)> = Vec::new();
    let mut push = |name: &str, confidence: f64| {
        let name = clean_candidate(name);
        if looks_like_company_name(name)
            && !is_review_site(name)
            && !names.iter().any(|(existing, _)| identity_key(existing) == identity_key(name))
        {
            names.push((name.to_string(), confidence));
        }
    };

    let mut segments = vec![finding.title.as_str()];
    for separator in TITLE_SEPARATORS {
        segments = segments
            .into_iter()
            .flat_map(|segment| segment.split(*separator))
            .collect();
    }
    // 榜单页标题末尾的发布站点名不是竞品
    let title = finding.title.to_lowercase();
    let is_listing = LISTING_MARKERS.iter().any(|marker| title.contains(marker));
    for segment in segments {
        let segment = clean_candidate(segment);
        if is_listing && host_matches(&finding.source, &identity_key(segment)) {
            continue;
        }
        push(segment, 0.6);
    }

    for sentence in sentences(&finding.text) {
        let lower = sentence.to_lowercase();
        let lead_in = LIST_LEAD_INS
            .iter()
            .filter_map(|lead| lower.rfind(lead).map(|index| index + lead.len()))
            .max();
        let list = match lead_in {
            Some(index) => match sentence.get(index..) {
                Some(rest) => rest,
                None => continue,
            },
            None if sentence.matches(',').count() >= 2 => sentence,
            None => continue,
        };
        let items: Vec<&str> = list
            .split([',', ';'])
            .flat_map(|item| item.split(" and "))
            .flat_map(|item| item.split(" or "))
            .map(clean_candidate)
            .filter(|item| looks_like_company_name(item))
            .collect();
        if items.len() >= 2 {
            for item in items {
                push(item, 0.5);
            }
        }
    }

    names
        .into_iter()
        .map(|(name, confidence)| CompetitorFact::new(FactField::Name, &name, confidence, finding))
        .collect()
}

fn source_bonus(finding: &RawFinding) -> f64 {
    match finding.source_kind {
        SourceKind::Scrape => 0.05,
        SourceKind::Search => 0.0,
    }
}

fn extract_description(finding: &RawFinding, subject: &str) -> Option<CompetitorFact> {
    sentences(&finding.text)
        .into_iter()
        .find(|sentence| {
            let len = sentence.chars().count();
            let lower = format!(" {} ", sentence.to_lowercase());
            (20..=300).contains(&len)
                && mentions(sentence, subject)
                && DESCRIPTION_VERBS.iter().any(|verb| lower.contains(verb))
        })
        .map(|sentence| {
            CompetitorFact::new(
                FactField::Description,
                sentence,
                0.55 + source_bonus(finding),
                finding,
            )
        })
}

/// 价格模式信号
#[derive(Debug, Default, PartialEq)]
struct PricingSignals {
    free: bool,
    subscription: bool,
    per_seat: bool,
    usage: bool,
    enterprise: bool,
    one_time: bool,
}

impl PricingSignals {
    fn detect(text: &str) -> Self {
        let lower = text.to_lowercase();
        let any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));
        Self {
            free: any(&["free plan", "free tier", "freemium", "free forever", "free version", "$0"]),
            subscription: any(&[
                "subscription",
                "per month",
                "/month",
                "/mo",
                "monthly",
                "annually",
                "per year",
                "/year",
            ]),
            per_seat: any(&["per user", "per seat", "/user", "per member", "/seat"]),
            usage: any(&[
                "usage-based",
                "pay as you go",
                "pay-as-you-go",
                "per transaction",
                "per api call",
                "metered",
            ]),
            enterprise: any(&["enterprise plan", "custom pricing", "contact sales"]),
            one_time: any(&["one-time", "lifetime deal", "perpetual license"]),
        }
    }

    fn count(&self) -> usize {
        [
            self.free,
            self.subscription,
            self.per_seat,
            self.usage,
            self.enterprise,
            self.one_time,
        ]
        .into_iter()
        .filter(|signal| *signal)
        .count()
    }

    fn label(&self) -> Option<String> {
        let paid = self.subscription || self.per_seat;
        let mut parts: Vec<&str> = Vec::new();
        if self.free {
            parts.push(if paid { "freemium" } else { "free" });
        }
        if self.per_seat {
            parts.push("per-seat subscription");
        } else if self.subscription {
            parts.push("subscription");
        }
        if self.usage {
            parts.push("usage-based");
        }
        if self.one_time {
            parts.push("one-time license");
        }
        if self.enterprise {
            parts.push("enterprise custom pricing");
        }
        let label = parts.join(", ");
        let mut chars = label.chars();
        chars
            .next()
            .map(|first| first.to_uppercase().collect::<String>() + chars.as_str())
    }
}

fn extract_pricing_model(finding: &RawFinding) -> Option<CompetitorFact> {
    let signals = PricingSignals::detect(&finding.full_text());
    let label = signals.label()?;
    let confidence = (0.45 + 0.1 * signals.count() as f64).min(0.85) + source_bonus(finding);
    Some(CompetitorFact::new(
        FactField::PricingModel,
        &label,
        confidence,
        finding,
    ))
}

fn extract_pricing_tiers(finding: &RawFinding) -> Option<CompetitorFact> {
    if finding.source_kind != SourceKind::Scrape {
        return None;
    }
    let mut tiers: Vec<(String, String)> = Vec::new();
    for caps in PRICING_TIER.captures_iter(&finding.text) {
        let (Some(name), Some(price)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let mut chars = name.as_str().chars();
        let name: String = chars
            .next()
            .map(|first| first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase())
            .unwrap_or_default();
        if tiers.iter().any(|(existing, _)| *existing == name) {
            continue;
        }
        let period = caps
            .get(3)
            .map(|m| m.as_str().to_lowercase().replace("per ", "/").replace(' ', ""))
            .unwrap_or_default()
            .replace("//", "/");
        tiers.push((name, format!("${}{}", price.as_str(), period)));
    }
    if tiers.is_empty() {
        return None;
    }
    let confidence = (0.5 + 0.05 * tiers.len() as f64).min(0.85);
    let value = tiers
        .iter()
        .map(|(name, price)| format!("{}: {}", name, price))
        .collect::<Vec<_>>()
        .join("; ");
    Some(CompetitorFact::new(
        FactField::PricingTiers,
        &value,
        confidence,
        finding,
    ))
}

fn extract_key_features(finding: &RawFinding) -> Option<CompetitorFact> {
    let text = finding.full_text();
    let mut features: Vec<String> = Vec::new();
    let mut push = |feature: &str| {
        let feature = clean_candidate(feature).to_lowercase();
        let words = feature.split_whitespace().count();
        if (2..=40).contains(&feature.chars().count())
            && (1..=4).contains(&words)
            && !features.contains(&feature)
        {
            features.push(feature);
        }
    };

    for caps in FEATURE_LIST.captures_iter(&text) {
        if let Some(list) = caps.get(1) {
            list.as_str()
                .split([',', ';'])
                .flat_map(|item| item.split(" and "))
                .for_each(&mut push);
        }
    }
    FEATURE_LEXICON
        .iter()
        .filter(|feature| mentions(&text, feature))
        .for_each(|feature| push(feature));

    if features.is_empty() {
        return None;
    }
    features.truncate(12);
    let confidence = (0.5 + 0.05 * features.len() as f64).min(0.8) + source_bonus(finding);
    Some(CompetitorFact::new(
        FactField::KeyFeatures,
        &features.join(", "),
        confidence,
        finding,
    ))
}

/// 与竞品相关的句子：提及竞品名，或来源就是竞品官网
fn subject_sentences<'a>(finding: &'a RawFinding, subject: &str, from_host: bool) -> Vec<&'a str> {
    sentences(&finding.text)
        .into_iter()
        .filter(|sentence| from_host || mentions(sentence, subject))
        .collect()
}

fn extract_market_position(
    finding: &RawFinding,
    subject: &str,
    from_host: bool,
) -> Option<CompetitorFact> {
    subject_sentences(finding, subject, from_host)
        .into_iter()
        .find(|sentence| {
            let lower = sentence.to_lowercase();
            sentence.chars().count() <= 300 && POSITION_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .map(|sentence| CompetitorFact::new(FactField::MarketPosition, sentence, 0.5, finding))
}

fn extract_target_audience(finding: &RawFinding) -> Option<CompetitorFact> {
    AUDIENCE
        .captures(&finding.full_text())
        .and_then(|caps| caps.get(1))
        .map(|m| {
            CompetitorFact::new(
                FactField::TargetAudience,
                &m.as_str().to_lowercase(),
                0.5 + source_bonus(finding),
                finding,
            )
        })
}

fn extract_revenue(finding: &RawFinding, subject: &str, from_host: bool) -> Option<CompetitorFact> {
    subject_sentences(finding, subject, from_host)
        .into_iter()
        .filter(|sentence| {
            let lower = format!(" {} ", sentence.to_lowercase());
            REVENUE_KEYWORDS
                .iter()
                .any(|k| lower.contains(&format!(" {}", k)))
        })
        .find_map(parse_revenue_billions)
        .map(|billions| {
            CompetitorFact::new(FactField::Revenue, &format_billions(billions), 0.55, finding)
        })
}

fn extract_market_share(
    finding: &RawFinding,
    subject: &str,
    from_host: bool,
) -> Option<CompetitorFact> {
    subject_sentences(finding, subject, from_host)
        .into_iter()
        .filter(|sentence| {
            let lower = sentence.to_lowercase();
            lower.contains("market share") || lower.contains("of the market")
        })
        .find_map(parse_market_share)
        .map(|share| {
            CompetitorFact::new(FactField::MarketShare, &format!("{:.1}%", share), 0.55, finding)
        })
}
