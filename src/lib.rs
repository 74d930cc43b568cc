pub mod cli;
pub mod config;
pub mod error;
pub mod generator;
pub mod llm;
pub mod tools;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::AnalysisError;
pub use generator::workflow::{AnalysisPipeline, launch};
pub use types::payload::AnalysisPayload;
pub use types::request::{AnalysisRequest, AnalysisType};
