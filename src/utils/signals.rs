//! 文本信号解析：句子切分、实体提及判断、营收/市场份额/价格数值解析

use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static REVENUE_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$?\s*(\d[\d,]*(?:\.\d+)?)\s*(trillion|billion|million|thousand|bn|tn|t|b|m|k)?\b")
        .expect("valid revenue regex")
});

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3}(?:\.\d+)?)\s?%").expect("valid percent regex"));

static PRICE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s?(\d[\d,]*(?:\.\d{1,2})?)").expect("valid price regex"));

/// 按句末标点切分句子
pub fn sentences(text: &str) -> Vec<&str> {
    let mut result = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | '\n') {
            let next = bytes.get(i + 1).copied();
            if next.is_none() || next.is_some_and(|b| b.is_ascii_whitespace()) {
                let sentence = text[start..=i].trim();
                if !sentence.is_empty() {
                    result.push(sentence);
                }
                start = i + 1;
            }
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        result.push(tail);
    }
    result
}

/// 文本中是否以完整单词形式提及name（忽略大小写）
pub fn mentions(text: &str, name: &str) -> bool {
    let needle = name.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }
    let haystack = text.to_lowercase();
    haystack.match_indices(&needle).any(|(index, _)| {
        let before = haystack[..index].chars().next_back();
        let after = haystack[index + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// URL的主机名是否包含身份键（去掉空格后比较）
pub fn host_matches(url: &str, identity_key: &str) -> bool {
    let compact: String = identity_key.chars().filter(|c| c.is_alphanumeric()).collect();
    if compact.len() < 3 {
        return false;
    }
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .is_some_and(|host| host.replace(['-', '.'], "").contains(&compact))
}

/// 解析营收描述为十亿美元，例如"$31.8B"、"$540 million"
pub fn parse_revenue_billions(text: &str) -> Option<f64> {
    REVENUE_AMOUNT.captures_iter(text).find_map(|caps| {
        let value: f64 = caps.get(1)?.as_str().replace(',', "").parse().ok()?;
        let unit = caps
            .get(2)
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_default();
        match unit.as_str() {
            "trillion" | "tn" | "t" => Some(value * 1000.0),
            "billion" | "bn" | "b" => Some(value),
            "million" | "m" => Some(value / 1000.0),
            "thousand" | "k" => Some(value / 1_000_000.0),
            // 无单位的大数视为美元
            _ if value >= 1_000_000.0 => Some(value / 1_000_000_000.0),
            _ => None,
        }
    })
}

/// 解析市场份额百分比
pub fn parse_market_share(text: &str) -> Option<f64> {
    PERCENT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|share| *share <= 100.0)
}

/// 提取文本中的全部美元价格
pub fn parse_prices(text: &str) -> Vec<f64> {
    PRICE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .collect()
}

/// 格式化十亿美元金额
pub fn format_billions(value: f64) -> String {
    if value >= 1.0 {
        format!("${:.1}B", value)
    } else {
        format!("${:.0}M", value * 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentences() {
        let text = "Asana is a work platform. It costs $10.99 per user! Really? yes";
        assert_eq!(
            sentences(text),
            vec![
                "Asana is a work platform.",
                "It costs $10.99 per user!",
                "Really?",
                "yes"
            ]
        );
    }

    #[test]
    fn test_mentions_whole_word() {
        assert!(mentions("Try ClickUp today", "clickup"));
        assert!(mentions("Notion, Asana and ClickUp", "Asana"));
        assert!(!mentions("Asanas are yoga poses", "Asana"));
        assert!(!mentions("anything", ""));
    }

    #[test]
    fn test_host_matches() {
        assert!(host_matches("https://www.clickup.com/pricing", "clickup"));
        assert!(host_matches("https://monday.com/pricing", "monday com"));
        assert!(!host_matches("https://g2.com/asana", "asana"));
        assert!(!host_matches("not a url", "asana"));
    }

    #[test]
    fn test_parse_revenue_billions() {
        assert_eq!(parse_revenue_billions("$31.797B"), Some(31.797));
        assert_eq!(parse_revenue_billions("$540 million"), Some(0.54));
        assert!((parse_revenue_billions("1.2 trillion").unwrap() - 1200.0).abs() < 1e-6);
        assert_eq!(parse_revenue_billions("grew 25% to $3 billion"), Some(3.0));
        assert_eq!(parse_revenue_billions("$2,500,000,000"), Some(2.5));
        assert_eq!(parse_revenue_billions("N/A"), None);
        assert_eq!(parse_revenue_billions("42"), None);
    }

    #[test]
    fn test_parse_market_share() {
        assert_eq!(parse_market_share("45.52%"), Some(45.52));
        assert_eq!(parse_market_share("about 12 % share"), Some(12.0));
        assert_eq!(parse_market_share("N/A"), None);
    }

    #[test]
    fn test_parse_prices() {
        assert_eq!(
            parse_prices("Free: $0; Starter: $10.99/user/month; Business: $1,200/year"),
            vec![0.0, 10.99, 1200.0]
        );
    }

    #[test]
    fn test_format_billions() {
        assert_eq!(format_billions(31.797), "$31.8B");
        assert_eq!(format_billions(0.54), "$540M");
    }
}
