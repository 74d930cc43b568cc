use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;

/// 调研类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisType {
    Competitor,
    Market,
    Swot,
    Pricing,
    #[default]
    Full,
}

impl std::fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisType::Competitor => write!(f, "competitor"),
            AnalysisType::Market => write!(f, "market"),
            AnalysisType::Swot => write!(f, "swot"),
            AnalysisType::Pricing => write!(f, "pricing"),
            AnalysisType::Full => write!(f, "full"),
        }
    }
}

impl std::str::FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "competitor" | "competitor_analysis" => Ok(AnalysisType::Competitor),
            "market" | "market_analysis" => Ok(AnalysisType::Market),
            "swot" | "swot_analysis" => Ok(AnalysisType::Swot),
            "pricing" | "pricing_analysis" => Ok(AnalysisType::Pricing),
            "full" | "full_analysis" => Ok(AnalysisType::Full),
            _ => Err(format!("Unknown analysis type: {}", s)),
        }
    }
}

/// 一次调研请求，运行期间不可变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// 公司名称或业务想法描述
    pub target: String,
    pub industry: Option<String>,
    pub target_audience: Option<String>,
    /// 关注的关键功能，逗号分隔
    pub key_features: Option<String>,
    #[serde(default)]
    pub analysis_type: AnalysisType,
}

impl AnalysisRequest {
    pub fn new(target: impl Into<String>, analysis_type: AnalysisType) -> Self {
        Self {
            target: target.into(),
            industry: None,
            target_audience: None,
            key_features: None,
            analysis_type,
        }
    }

    pub fn with_industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    pub fn with_target_audience(mut self, audience: impl Into<String>) -> Self {
        self.target_audience = Some(audience.into());
        self
    }

    pub fn with_key_features(mut self, features: impl Into<String>) -> Self {
        self.key_features = Some(features.into());
        self
    }

    /// 去除首尾空白后的目标描述；为空时请求非法
    pub fn validated_target(&self) -> Result<&str, AnalysisError> {
        let target = self.target.trim();
        if target.is_empty() {
            return Err(AnalysisError::InvalidRequest(
                "target descriptor is empty".to_string(),
            ));
        }
        Ok(target)
    }

    pub fn industry_hint(&self) -> Option<&str> {
        non_blank(self.industry.as_deref())
    }

    pub fn audience_hint(&self) -> Option<&str> {
        non_blank(self.target_audience.as_deref())
    }

    /// 拆分关键功能提示
    pub fn feature_hints(&self) -> Vec<String> {
        non_blank(self.key_features.as_deref())
            .map(|s| {
                s.split([',', ';', '\n'])
                    .map(|f| f.trim().to_lowercase())
                    .filter(|f| !f.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_type_from_str() {
        assert_eq!("full".parse::<AnalysisType>().unwrap(), AnalysisType::Full);
        assert_eq!(
            "Pricing Analysis".replace(' ', "_").parse::<AnalysisType>().unwrap(),
            AnalysisType::Pricing
        );
        assert_eq!(" swot ".parse::<AnalysisType>().unwrap(), AnalysisType::Swot);
        assert!("weather".parse::<AnalysisType>().is_err());
    }

    #[test]
    fn test_whitespace_target_is_invalid() {
        let request = AnalysisRequest::new("  \t\n", AnalysisType::Full);
        assert!(matches!(
            request.validated_target(),
            Err(AnalysisError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_feature_hints_split() {
        let request = AnalysisRequest::new("Notion", AnalysisType::Full)
            .with_key_features("Wiki, Task Management;  ,AI writing");
        assert_eq!(
            request.feature_hints(),
            vec!["wiki", "task management", "ai writing"]
        );
    }
}
