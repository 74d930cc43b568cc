use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::types::payload::AnalysisPayload;

pub mod report;
pub mod table;

pub const PAYLOAD_FILE: &str = "analysis.json";
pub const TABLE_FILE: &str = "competitors.csv";
pub const REPORT_FILE: &str = "report.md";

pub trait Outlet {
    fn save(&self, payload: &AnalysisPayload) -> Result<()>;
}

/// 把调研结果写入本地目录：完整载荷JSON、竞品CSV表与Markdown报告
pub struct DiskOutlet {
    output_dir: PathBuf,
}

impl DiskOutlet {
    pub fn new(output_dir: &Path) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
        }
    }

    fn write(&self, file_name: &str, content: &str) -> Result<()> {
        let output_file_path = self.output_dir.join(file_name);
        fs::write(&output_file_path, content)
            .with_context(|| format!("Failed to write {}", output_file_path.display()))?;
        info!("💾 已保存: {}", output_file_path.display());
        Ok(())
    }
}

impl Outlet for DiskOutlet {
    fn save(&self, payload: &AnalysisPayload) -> Result<()> {
        info!("\n🖊️ 调研报告存储中...");
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output dir {}", self.output_dir.display())
        })?;

        let json =
            serde_json::to_string_pretty(payload).context("Failed to serialize analysis payload")?;
        self.write(PAYLOAD_FILE, &json)?;
        self.write(TABLE_FILE, &table::render_csv(payload))?;
        self.write(REPORT_FILE, &report::render_markdown(payload))?;

        info!("💾 报告保存完成，输出目录: {}", self.output_dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::compose::Synthesizer;
    use crate::types::competitor::CompetitorRecord;
    use crate::types::finding::{CompetitorFact, FactField, RawFinding};
    use crate::types::request::{AnalysisRequest, AnalysisType};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_writes_all_artifacts() {
        let finding = RawFinding::search("https://asana.com", "", "");
        let mut asana = CompetitorRecord::new("asana", "Asana");
        asana.merge(CompetitorFact::new(FactField::PricingModel, "Freemium", 0.6, &finding));
        let request = AnalysisRequest::new("Notion", AnalysisType::Pricing);
        let payload = Synthesizer::new(None).synthesize(&[asana], &request).await;

        let temp_dir = TempDir::new().unwrap();
        let output_dir = temp_dir.path().join("nested").join("out");
        DiskOutlet::new(&output_dir).save(&payload).unwrap();

        let json = fs::read_to_string(output_dir.join(PAYLOAD_FILE)).unwrap();
        let restored: AnalysisPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.run_id, payload.run_id);
        assert_eq!(restored.competitors[0].value(FactField::PricingModel), Some("Freemium"));

        let csv = fs::read_to_string(output_dir.join(TABLE_FILE)).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.lines().nth(1).unwrap().starts_with("Asana,"));

        let markdown = fs::read_to_string(output_dir.join(REPORT_FILE)).unwrap();
        assert!(markdown.starts_with("# Competitive analysis: Notion"));
    }
}
