//! 竞品注册表 - 按身份键去重合并事实，是采集阶段唯一的共享可变状态

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

use crate::error::RegistryError;
use crate::types::competitor::CompetitorRecord;
use crate::types::finding::CompetitorFact;
use crate::types::step::CompetitorRef;

/// 名称末尾会被去掉的公司类型后缀
pub const LEGAL_SUFFIXES: [&str; 14] = [
    "inc",
    "incorporated",
    "llc",
    "ltd",
    "limited",
    "corp",
    "corporation",
    "co",
    "company",
    "gmbh",
    "plc",
    "ag",
    "sa",
    "pty",
];

/// 归一化公司名：小写、去标点、合并空白、去掉公司类型后缀
pub fn identity_key(name: &str) -> String {
    let cleaned: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '&' { c } else { ' ' })
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    while tokens.len() > 1 && tokens.last().is_some_and(|t| LEGAL_SUFFIXES.contains(t)) {
        tokens.pop();
    }
    tokens.join(" ")
}

/// 两个身份键是否指向同一实体：相等，或一方是另一方的子串且长度比不低于阈值
pub fn identities_match(a: &str, b: &str, ratio: f64) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };
    long.contains(short) && short.chars().count() as f64 / long.chars().count() as f64 >= ratio
}

/// 至少包含一个字母才算可识别的公司名
fn is_recognizable(key: &str) -> bool {
    key.chars().any(char::is_alphabetic)
}

#[derive(Default)]
struct RegistryState {
    frozen: bool,
    /// 按首次识别顺序保存
    entries: Vec<(String, Arc<Mutex<CompetitorRecord>>)>,
}

impl RegistryState {
    fn resolve(&self, key: &str, ratio: f64) -> Option<&Arc<Mutex<CompetitorRecord>>> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(existing, _)| identities_match(existing, key, ratio))
            })
            .map(|(_, record)| record)
    }
}

/// 单次运行的竞品注册表。
/// 索引使用读写锁，记录各自持有互斥锁：同一身份的更新串行，不同身份可并行。
pub struct CompetitorRegistry {
    match_ratio: f64,
    state: RwLock<RegistryState>,
}

impl CompetitorRegistry {
    pub fn new(match_ratio: f64) -> Self {
        Self {
            match_ratio,
            state: RwLock::new(RegistryState::default()),
        }
    }

    /// 按候选名称解析已存在的竞品
    pub fn resolve(&self, candidate: &str) -> Option<CompetitorRef> {
        let key = identity_key(candidate);
        let state = self.state.read();
        state.resolve(&key, self.match_ratio).map(|record| {
            let record = record.lock();
            CompetitorRef {
                identity_key: record.identity_key.clone(),
                name: record.first_seen_name.clone(),
            }
        })
    }

    /// 合并候选实体及其事实，返回合并后的记录
    pub fn upsert(
        &self,
        candidate: &str,
        facts: Vec<CompetitorFact>,
    ) -> Result<CompetitorRecord, RegistryError> {
        let key = identity_key(candidate);
        if !is_recognizable(&key) {
            return Err(RegistryError::UnrecognizedIdentity(candidate.to_string()));
        }

        {
            let state = self.state.read();
            if state.frozen {
                return Err(RegistryError::Frozen(candidate.to_string()));
            }
            if let Some(record) = state.resolve(&key, self.match_ratio) {
                return Ok(Self::merge_all(&mut record.lock(), facts));
            }
        }

        let mut state = self.state.write();
        if state.frozen {
            return Err(RegistryError::Frozen(candidate.to_string()));
        }
        // 释放读锁期间可能已有其他任务插入了同一实体
        if let Some(record) = state.resolve(&key, self.match_ratio) {
            let record = record.clone();
            drop(state);
            return Ok(Self::merge_all(&mut record.lock(), facts));
        }

        let record = Arc::new(Mutex::new(CompetitorRecord::new(&key, candidate)));
        let merged = Self::merge_all(&mut record.lock(), facts);
        state.entries.push((key, record));
        Ok(merged)
    }

    fn merge_all(record: &mut CompetitorRecord, facts: Vec<CompetitorFact>) -> CompetitorRecord {
        for fact in facts {
            record.merge(fact);
        }
        record.clone()
    }

    /// 按首次识别顺序返回全部记录
    pub fn snapshot(&self) -> Vec<CompetitorRecord> {
        self.state
            .read()
            .entries
            .iter()
            .map(|(_, record)| record.lock().clone())
            .collect()
    }

    /// 冻结注册表并返回最终快照
    pub fn finalize(&self) -> Vec<CompetitorRecord> {
        let mut state = self.state.write();
        state.frozen = true;
        state
            .entries
            .iter()
            .map(|(_, record)| record.lock().clone())
            .collect()
    }

    pub fn is_frozen(&self) -> bool {
        self.state.read().frozen
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn match_ratio(&self) -> f64 {
        self.match_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::finding::{FactField, RawFinding};
    use chrono::{TimeZone, Utc};

    fn fact(field: FactField, value: &str, confidence: f64, url: &str) -> CompetitorFact {
        let finding = RawFinding::search(url, "", value)
            .observed(Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap());
        CompetitorFact::new(field, value, confidence, &finding)
    }

    #[test]
    fn test_identity_key_normalization() {
        assert_eq!(identity_key("Stripe, Inc."), "stripe");
        assert_eq!(identity_key("  stripe "), "stripe");
        assert_eq!(identity_key("Monday.com"), "monday com");
        assert_eq!(identity_key("AT&T Corp"), "at&t");
        assert_eq!(identity_key("Inc"), "inc");
        assert_eq!(identity_key("Google   LLC"), "google");
    }

    #[test]
    fn test_identities_match_ratio() {
        assert!(identities_match("stripe", "stripe", 0.6));
        // "stripe" / "stripe inc" = 0.6
        assert!(identities_match("stripe", "stripe inc", 0.6));
        assert!(!identities_match("box", "dropbox", 0.6));
        assert!(!identities_match("", "stripe", 0.6));
        assert!(!identities_match("asana", "clickup", 0.6));
    }

    #[test]
    fn test_stripe_variants_merge_into_one_record() {
        let registry = CompetitorRegistry::new(0.6);
        registry
            .upsert("Stripe, Inc.", vec![fact(FactField::Name, "Stripe, Inc.", 0.6, "https://a")])
            .unwrap();
        registry
            .upsert("stripe", vec![fact(FactField::Name, "stripe", 0.5, "https://b")])
            .unwrap();

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].identity_key, "stripe");
        assert_eq!(snapshot[0].facts[&FactField::Name].len(), 2);
        assert_eq!(snapshot[0].display_name(), "Stripe, Inc.");
    }

    #[test]
    fn test_unrelated_short_names_stay_separate() {
        let registry = CompetitorRegistry::new(0.6);
        registry.upsert("Box", vec![]).unwrap();
        registry.upsert("Dropbox", vec![]).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let once = CompetitorRegistry::new(0.6);
        let twice = CompetitorRegistry::new(0.6);
        let f = fact(FactField::PricingModel, "Freemium", 0.7, "https://asana.com/pricing");

        once.upsert("Asana", vec![f.clone()]).unwrap();
        twice.upsert("Asana", vec![f.clone()]).unwrap();
        twice.upsert("Asana", vec![f]).unwrap();

        assert_eq!(once.snapshot(), twice.snapshot());
    }

    #[test]
    fn test_upsert_is_commutative_across_competitors() {
        let a = vec![fact(FactField::PricingModel, "Freemium", 0.7, "https://asana.com")];
        let b = vec![fact(FactField::KeyFeatures, "automation", 0.6, "https://clickup.com")];

        let ab = CompetitorRegistry::new(0.6);
        ab.upsert("Asana", a.clone()).unwrap();
        ab.upsert("ClickUp", b.clone()).unwrap();

        let ba = CompetitorRegistry::new(0.6);
        ba.upsert("ClickUp", b).unwrap();
        ba.upsert("Asana", a).unwrap();

        let mut left = ab.snapshot();
        let mut right = ba.snapshot();
        left.sort_by(|x, y| x.identity_key.cmp(&y.identity_key));
        right.sort_by(|x, y| x.identity_key.cmp(&y.identity_key));
        assert_eq!(left, right);
    }

    #[test]
    fn test_winner_independent_of_arrival_order() {
        let high = fact(FactField::PricingModel, "Subscription", 0.8, "https://a");
        let low = fact(FactField::PricingModel, "Freemium", 0.8, "https://b");

        let first = CompetitorRegistry::new(0.6);
        first.upsert("Asana", vec![high.clone(), low.clone()]).unwrap();
        let second = CompetitorRegistry::new(0.6);
        second.upsert("Asana", vec![low, high]).unwrap();

        assert_eq!(
            first.snapshot()[0].value(FactField::PricingModel),
            second.snapshot()[0].value(FactField::PricingModel)
        );
    }

    #[test]
    fn test_finalize_freezes_registry() {
        let registry = CompetitorRegistry::new(0.6);
        registry.upsert("Asana", vec![]).unwrap();
        let records = registry.finalize();

        assert_eq!(records.len(), 1);
        assert!(registry.is_frozen());
        assert_eq!(
            registry.upsert("Asana", vec![]),
            Err(RegistryError::Frozen("Asana".to_string()))
        );
        assert!(registry.upsert("ClickUp", vec![]).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_rejects_unrecognizable_identity() {
        let registry = CompetitorRegistry::new(0.6);
        assert!(matches!(
            registry.upsert(" -- 2024 ", vec![]),
            Err(RegistryError::UnrecognizedIdentity(_))
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_upserts_do_not_duplicate() {
        let registry = Arc::new(CompetitorRegistry::new(0.6));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    let name = if i % 2 == 0 { "Stripe" } else { "Stripe Inc" };
                    let url = format!("https://source/{}", i);
                    registry
                        .upsert(name, vec![fact(FactField::Revenue, "$14B", 0.5, &url)])
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].facts[&FactField::Revenue].len(), 8);
    }

    #[test]
    fn test_resolve_returns_first_seen_reference() {
        let registry = CompetitorRegistry::new(0.6);
        registry.upsert("ClickUp", vec![]).unwrap();
        let reference = registry.resolve("clickup").unwrap();
        assert_eq!(reference.identity_key, "clickup");
        assert_eq!(reference.name, "ClickUp");
        assert!(registry.resolve("Asana").is_none());
    }
}
