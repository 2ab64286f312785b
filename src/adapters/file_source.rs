use crate::domain::model::CustomerRecord;
use crate::domain::ports::RecordSource;
use crate::utils::error::{NotifierError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

const SOURCE_NAME: &str = "file";

/// 從 JSON 檔（客戶文件陣列）讀取，適合匯出檔或本機測試
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for JsonFileSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_all(&self) -> Result<Vec<CustomerRecord>> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            NotifierError::source_unavailable(
                SOURCE_NAME,
                format!("{}: {}", self.path.display(), e),
            )
        })?;

        let mut records: Vec<CustomerRecord> = serde_json::from_slice(&data).map_err(|e| {
            NotifierError::source_unavailable(
                SOURCE_NAME,
                format!("{}: invalid customer JSON: {}", self.path.display(), e),
            )
        })?;

        for (index, record) in records.iter_mut().enumerate() {
            if record.id.trim().is_empty() {
                record.id = format!("row-{}", index + 1);
            }
        }

        tracing::debug!("Loaded {} customers from {}", records.len(), self.path.display());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn test_reads_customer_array_and_assigns_missing_ids() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"[
                {"id": "c1", "fullName": "Sara", "instagramHandle": "sara", "birthday": "1994-03-10"},
                {"fullName": "No Id", "birthday": "not-a-date"}
            ]"#,
        )
        .unwrap();

        let records = JsonFileSource::new(file.path()).fetch_all().await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "c1");
        assert_eq!(records[1].id, "row-2");
        assert_eq!(records[1].birthday.as_deref(), Some("not-a-date"));
    }

    #[tokio::test]
    async fn test_missing_file_is_source_unavailable() {
        let err = JsonFileSource::new("/definitely/not/here.json")
            .fetch_all()
            .await
            .unwrap_err();
        assert!(matches!(err, NotifierError::SourceUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_malformed_json_is_source_unavailable() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();

        let err = JsonFileSource::new(file.path()).fetch_all().await.unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
