//! LLM能力接口 - 编排逻辑只依赖`complete(prompt, schema)`，与具体模型/厂商无关

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::LlmError;

pub mod client;

pub use client::LLMClient;

/// 一次结构化补全请求
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionPrompt {
    pub system: String,
    pub user: String,
}

impl CompletionPrompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// 结构化补全能力，返回符合schema的JSON值
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &CompletionPrompt, schema: &Value) -> Result<Value, LlmError>;
}

/// 按类型T的JSON Schema调用模型并反序列化结果
pub async fn extract<T>(model: &dyn LanguageModel, prompt: &CompletionPrompt) -> Result<T, LlmError>
where
    T: JsonSchema + DeserializeOwned,
{
    let schema = serde_json::to_value(schemars::schema_for!(T))
        .map_err(|e| LlmError::MalformedResponse(e.to_string()))?;
    let value = model.complete(prompt, &schema).await?;
    serde_json::from_value(value).map_err(|e| LlmError::MalformedResponse(e.to_string()))
}

/// 从模型回复中解析JSON：去掉markdown代码块，必要时截取首尾大括号之间的内容
pub fn parse_json_response(raw: &str) -> Result<Value, LlmError> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```"))
        .unwrap_or(trimmed)
        .trim();

    if let Ok(value) = serde_json::from_str::<Value>(unfenced) {
        return Ok(value);
    }

    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => serde_json::from_str(&unfenced[start..=end])
            .map_err(|e| LlmError::MalformedResponse(e.to_string())),
        _ => Err(LlmError::MalformedResponse(format!(
            "no JSON object in response: {}",
            unfenced.chars().take(120).collect::<String>()
        ))),
    }
}
