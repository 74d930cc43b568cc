use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::finding::{CompetitorFact, FactField};

/// 去重后的竞品实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorRecord {
    /// 归一化后的公司名，用于去重
    pub identity_key: String,
    /// 首次识别时的名称
    pub first_seen_name: String,
    /// 每个字段的全部事实，按首次出现顺序保存
    pub facts: BTreeMap<FactField, Vec<CompetitorFact>>,
}

impl CompetitorRecord {
    pub fn new(identity_key: &str, first_seen_name: &str) -> Self {
        Self {
            identity_key: identity_key.to_string(),
            first_seen_name: first_seen_name.trim().to_string(),
            facts: BTreeMap::new(),
        }
    }

    /// 合并一条事实，已有相同观测时忽略；返回是否新增
    pub fn merge(&mut self, fact: CompetitorFact) -> bool {
        let entries = self.facts.entry(fact.field).or_default();
        if entries.iter().any(|existing| existing.same_observation(&fact)) {
            return false;
        }
        entries.push(fact);
        true
    }

    /// 字段当前胜出的事实
    pub fn winning(&self, field: FactField) -> Option<&CompetitorFact> {
        self.facts.get(&field).and_then(|facts| {
            facts.iter().fold(None, |best: Option<&CompetitorFact>, fact| match best {
                Some(current) if !fact.outranks(current) => Some(current),
                _ => Some(fact),
            })
        })
    }

    pub fn value(&self, field: FactField) -> Option<&str> {
        self.winning(field).map(|fact| fact.value.as_str())
    }

    pub fn all_values(&self, field: FactField) -> impl Iterator<Item = &str> {
        self.facts
            .get(&field)
            .into_iter()
            .flat_map(|facts| facts.iter().map(|fact| fact.value.as_str()))
    }

    /// 展示名称：优先使用胜出的name事实
    pub fn display_name(&self) -> &str {
        self.value(FactField::Name)
            .unwrap_or(self.first_seen_name.as_str())
    }

    pub fn fact_count(&self) -> usize {
        self.facts.values().map(Vec::len).sum()
    }

    pub fn has_field(&self, field: FactField) -> bool {
        self.facts.get(&field).is_some_and(|facts| !facts.is_empty())
    }
}
