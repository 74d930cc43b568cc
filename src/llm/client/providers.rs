//! LLM Provider适配：构造rig客户端，并将Agent的文本输出收敛为结构化JSON

use rig::{agent::Agent, client::CompletionClient, completion::Prompt};
use serde_json::Value;

use crate::config::{LLMConfig, LLMProvider};
use crate::error::LlmError;
use crate::llm::parse_json_response;

/// 对每个Agent变体执行同一段表达式
macro_rules! with_agent {
    ($agent:expr, $inner:ident => $body:expr) => {
        match $agent {
            ProviderAgent::OpenAI($inner) => $body,
            ProviderAgent::Moonshot($inner) => $body,
            ProviderAgent::DeepSeek($inner) => $body,
            ProviderAgent::Mistral($inner) => $body,
            ProviderAgent::OpenRouter($inner) => $body,
            ProviderAgent::Anthropic($inner) => $body,
            ProviderAgent::Ollama($inner) => $body,
        }
    };
}

/// 在系统提示词后追加结构化输出约束
pub fn with_schema_instruction(system_prompt: &str, schema: &Value) -> String {
    format!(
        "{}\n\nRespond ONLY with a single JSON object that conforms to this JSON Schema. \
Do not wrap it in prose.\n{}",
        system_prompt,
        serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
    )
}

#[derive(Clone)]
pub enum ProviderClient {
    OpenAI(rig::providers::openai::Client),
    Moonshot(rig::providers::moonshot::Client),
    DeepSeek(rig::providers::deepseek::Client),
    Mistral(rig::providers::mistral::Client),
    OpenRouter(rig::providers::openrouter::Client),
    Anthropic(rig::providers::anthropic::Client),
    Ollama(rig::providers::ollama::Client),
}

impl ProviderClient {
    pub fn new(config: &LLMConfig) -> Result<Self, LlmError> {
        let key = config.api_key.as_str();
        let base_url = config.api_base_url.as_str();
        let client = match config.provider {
            LLMProvider::OpenAI => Self::OpenAI(
                rig::providers::openai::Client::builder(key)
                    .base_url(base_url)
                    .build(),
            ),
            LLMProvider::Moonshot => Self::Moonshot(
                rig::providers::moonshot::Client::builder(key)
                    .base_url(base_url)
                    .build(),
            ),
            LLMProvider::DeepSeek => Self::DeepSeek(
                rig::providers::deepseek::Client::builder(key)
                    .base_url(base_url)
                    .build(),
            ),
            LLMProvider::Mistral => {
                Self::Mistral(rig::providers::mistral::Client::builder(key).build())
            }
            LLMProvider::OpenRouter => {
                Self::OpenRouter(rig::providers::openrouter::Client::builder(key).build())
            }
            LLMProvider::Anthropic => Self::Anthropic(
                rig::providers::anthropic::ClientBuilder::new(key)
                    .build()
                    .map_err(|e| LlmError::Provider(format!("anthropic client: {}", e)))?,
            ),
            LLMProvider::Ollama => Self::Ollama(rig::providers::ollama::Client::builder().build()),
        };
        Ok(client)
    }

    /// 创建要求按schema输出JSON的Agent，不挂载工具
    pub fn structured_agent(
        &self,
        model: &str,
        system_prompt: &str,
        schema: &Value,
        config: &LLMConfig,
    ) -> ProviderAgent {
        self.create_agent(model, &with_schema_instruction(system_prompt, schema), config)
    }

    pub fn create_agent(&self, model: &str, preamble: &str, config: &LLMConfig) -> ProviderAgent {
        let max_tokens = u64::from(config.max_tokens);
        let temperature = config.temperature;
        match self {
            Self::OpenAI(client) => ProviderAgent::OpenAI(
                client
                    .completion_model(model)
                    .completions_api()
                    .into_agent_builder()
                    .preamble(preamble)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .build(),
            ),
            Self::Moonshot(client) => ProviderAgent::Moonshot(
                client.agent(model).preamble(preamble).temperature(temperature).build(),
            ),
            Self::DeepSeek(client) => ProviderAgent::DeepSeek(
                client.agent(model).preamble(preamble).temperature(temperature).build(),
            ),
            Self::Mistral(client) => ProviderAgent::Mistral(
                client.agent(model).preamble(preamble).temperature(temperature).build(),
            ),
            Self::OpenRouter(client) => ProviderAgent::OpenRouter(
                client.agent(model).preamble(preamble).temperature(temperature).build(),
            ),
            // Anthropic与Ollama要求显式的max_tokens
            Self::Anthropic(client) => ProviderAgent::Anthropic(
                client
                    .agent(model)
                    .preamble(preamble)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .build(),
            ),
            Self::Ollama(client) => ProviderAgent::Ollama(
                client
                    .agent(model)
                    .preamble(preamble)
                    .max_tokens(max_tokens)
                    .temperature(temperature)
                    .build(),
            ),
        }
    }
}

pub enum ProviderAgent {
    OpenAI(Agent<rig::providers::openai::CompletionModel>),
    Moonshot(Agent<rig::providers::moonshot::CompletionModel>),
    DeepSeek(Agent<rig::providers::deepseek::CompletionModel>),
    Mistral(Agent<rig::providers::mistral::CompletionModel>),
    OpenRouter(Agent<rig::providers::openrouter::CompletionModel>),
    Anthropic(Agent<rig::providers::anthropic::completion::CompletionModel>),
    Ollama(Agent<rig::providers::ollama::CompletionModel<reqwest::Client>>),
}

impl ProviderAgent {
    /// 发送prompt并返回原始文本
    pub async fn prompt(&self, prompt: &str) -> Result<String, LlmError> {
        with_agent!(self, agent => agent
            .prompt(prompt)
            .await
            .map_err(|e| LlmError::Provider(e.to_string())))
    }

    /// 发送prompt并解析结构化JSON输出
    pub async fn complete_json(&self, prompt: &str) -> Result<Value, LlmError> {
        let raw = self.prompt(prompt).await?;
        parse_json_response(&raw)
    }
}
