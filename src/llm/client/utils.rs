use crate::config::LLMConfig;

/// 短上下文优先使用高能效模型，并以高质量模型兜底；长上下文直接使用高质量模型
pub fn evaluate_befitting_model(
    llm_config: &LLMConfig,
    system_prompt: &str,
    user_prompt: &str,
) -> (String, Option<String>) {
    if system_prompt.len() + user_prompt.len() <= 32 * 1024 {
        return (
            llm_config.model_efficient.clone(),
            Some(llm_config.model_powerful.clone()),
        );
    }
    (llm_config.model_powerful.clone(), None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_prompt_prefers_efficient_model() {
        let config = LLMConfig::default();
        let (model, fallover) = evaluate_befitting_model(&config, "system", "user");
        assert_eq!(model, config.model_efficient);
        assert_eq!(fallover, Some(config.model_powerful.clone()));
    }

    #[test]
    fn test_long_prompt_uses_powerful_model() {
        let config = LLMConfig::default();
        let long = "x".repeat(40 * 1024);
        let (model, fallover) = evaluate_befitting_model(&config, "system", &long);
        assert_eq!(model, config.model_powerful);
        assert!(fallover.is_none());
    }
}
