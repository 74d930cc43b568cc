use thiserror::Error;

/// 运行级错误，只有这些错误会返回给调用方
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no competitors could be identified for '{target}'")]
    NoCompetitorsIdentified { target: String },

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
}

/// 竞品注册表错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("registry is finalized, mutation rejected for '{0}'")]
    Frozen(String),

    #[error("'{0}' does not contain a recognizable company name")]
    UnrecognizedIdentity(String),
}

/// 工具网关错误，均视为可重试的瞬时故障
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request blocked with status {status}: {target}")]
    Blocked { status: u16, target: String },

    #[error("empty result for {0}")]
    EmptyResult(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl ToolError {
    /// 非法URL重试也不会成功
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ToolError::InvalidUrl(_))
    }
}

/// LLM调用错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("llm provider error: {0}")]
    Provider(String),

    #[error("llm returned malformed structured output: {0}")]
    MalformedResponse(String),

    #[error("llm is disabled")]
    Disabled,
}
