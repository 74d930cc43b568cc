//! LLM客户端 - 基于rig的结构化补全实现

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use tracing::{info, warn};

use crate::config::LLMConfig;
use crate::error::LlmError;
use crate::llm::{CompletionPrompt, LanguageModel};

mod providers;
pub mod utils;

use providers::ProviderClient;
use utils::evaluate_befitting_model;

/// LLM客户端 - 提供统一的LLM服务接口
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: &LLMConfig) -> Result<Self, LlmError> {
        let client = ProviderClient::new(config)?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// 检查模型连接和功能是否正常
    pub async fn check_connection(&self) -> Result<(), LlmError> {
        info!("🔄 正在检查模型连接...");
        let agent = self.client.create_agent(
            &self.config.model_efficient,
            "System: You are a helpful assistant.",
            &self.config,
        );
        match self.retry_with_backoff(|| agent.prompt("Hello")).await {
            Ok(_) => {
                info!("✅ 模型连接正常");
                Ok(())
            }
            Err(e) => {
                warn!("❌ 模型连接失败: {}", e);
                Err(e)
            }
        }
    }

    /// 通用重试逻辑，用于处理异步操作的重试机制
    async fn retry_with_backoff<T, F, Fut>(&self, operation: F) -> Result<T, LlmError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, LlmError>>,
    {
        let max_retries = self.config.retry_attempts.max(1);
        let retry_delay_ms = self.config.retry_delay_ms;
        let mut retries = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    retries += 1;
                    warn!(
                        "❌ 调用模型服务出错，重试中 (第 {} / {}次尝试): {}",
                        retries, max_retries, err
                    );
                    if retries >= max_retries {
                        return Err(err);
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(retry_delay_ms)).await;
                }
            }
        }
    }

    async fn complete_with_model(
        &self,
        model: &str,
        prompt: &CompletionPrompt,
        user_prompt: &str,
        schema: &Value,
    ) -> Result<Value, LlmError> {
        let agent = &self
            .client
            .structured_agent(model, &prompt.system, schema, &self.config);
        self.retry_with_backoff(|| agent.complete_json(user_prompt))
            .await
    }
}

#[async_trait]
impl LanguageModel for LLMClient {
    async fn complete(&self, prompt: &CompletionPrompt, schema: &Value) -> Result<Value, LlmError> {
        if !self.config.enabled {
            return Err(LlmError::Disabled);
        }
        let (befitting_model, fallover_model) =
            evaluate_befitting_model(&self.config, &prompt.system, &prompt.user);

        match self
            .complete_with_model(&befitting_model, prompt, &prompt.user, schema)
            .await
        {
            Ok(value) => Ok(value),
            Err(e) => match fallover_model {
                Some(model) => {
                    warn!(
                        "❌ 调用模型服务出错，尝试 {} 次均失败，尝试使用备选模型{}...{}",
                        self.config.retry_attempts, model, e
                    );
                    let user_prompt_with_fixer = format!(
                        "{}\n\nNOTE: a previous attempt failed with the error \"{}\". Avoid repeating it.",
                        prompt.user, e
                    );
                    self.complete_with_model(&model, prompt, &user_prompt_with_fixer, schema)
                        .await
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LLMProvider;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ollama_client(enabled: bool) -> LLMClient {
        let config = LLMConfig {
            provider: LLMProvider::Ollama,
            enabled,
            retry_attempts: 2,
            retry_delay_ms: 10,
            ..LLMConfig::default()
        };
        LLMClient::new(&config).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_keeps_error_kind() {
        let client = ollama_client(true);
        let calls = AtomicU32::new(0);
        let result: Result<(), LlmError> = client
            .retry_with_backoff(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(LlmError::MalformedResponse("not json".to_string()))
            })
            .await;

        assert!(matches!(result, Err(LlmError::MalformedResponse(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disabled_client_refuses_completion() {
        let client = ollama_client(false);
        let prompt = CompletionPrompt::new("system", "user");
        let result = client.complete(&prompt, &serde_json::json!({})).await;
        assert!(matches!(result, Err(LlmError::Disabled)));
    }
}
