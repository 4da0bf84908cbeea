//! CSV output of accepted releases.
//!
//! The file is named after the run's date window and written with a UTF-8
//! byte-order mark so spreadsheet tools pick the right encoding for Japanese
//! titles.
//!
//! # Output Path
//!
//! `{output_dir}/{lower_bound}-{today}.csv`, dates formatted `%Y_%m_%d`.

use crate::models::NewsRecord;
use crate::window::DateWindow;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// What happened when the result set was handed to persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The run found nothing; no file was created.
    NoRecords,
    /// Records were written to `path`.
    Written { path: PathBuf, count: usize },
}

/// File name for a run's window, e.g. `2024_05_09-2024_05_16.csv`.
pub fn output_filename(window: &DateWindow) -> String {
    format!(
        "{}-{}.csv",
        window.lower_bound().format("%Y_%m_%d"),
        window.today().format("%Y_%m_%d")
    )
}

/// Write records to a CSV file in `output_dir`.
///
/// # Returns
///
/// [`PersistOutcome::NoRecords`] without touching the file system when
/// `records` is empty, otherwise the written path and row count.
///
/// # Errors
///
/// Returns an error if serialization or the file write fails.
#[instrument(level = "info", skip_all, fields(%output_dir, count = records.len()))]
pub async fn write_records(
    records: &[NewsRecord],
    output_dir: &str,
    window: &DateWindow,
) -> Result<PersistOutcome, Box<dyn Error>> {
    if records.is_empty() {
        return Ok(PersistOutcome::NoRecords);
    }

    let mut buf = UTF8_BOM.to_vec();
    {
        let mut writer = csv::Writer::from_writer(&mut buf);
        for record in records {
            writer.serialize(record)?;
        }
        writer.flush()?;
    }

    let path = Path::new(output_dir).join(output_filename(window));
    fs::write(&path, buf).await?;
    info!(path = %path.display(), "Wrote release file");

    Ok(PersistOutcome::Written {
        path,
        count: records.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    async fn read_records(path: &Path) -> Vec<NewsRecord> {
        let bytes = fs::read(path).await.unwrap();
        let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes.as_slice());
        csv::Reader::from_reader(body)
            .deserialize()
            .collect::<Result<Vec<NewsRecord>, _>>()
            .unwrap()
    }

    fn window() -> DateWindow {
        DateWindow::new(NaiveDate::from_ymd_opt(2024, 5, 16).unwrap(), 7)
    }

    fn record(company: &str, title: &str, url: &str) -> NewsRecord {
        NewsRecord {
            company: company.to_string(),
            title: title.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(output_filename(&window()), "2024_05_09-2024_05_16.csv");
    }

    #[tokio::test]
    async fn test_empty_result_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = write_records(&[], dir.path().to_str().unwrap(), &window())
            .await
            .unwrap();

        assert_eq!(outcome, PersistOutcome::NoRecords);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_round_trip_preserves_fields() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![
            record("株式会社サンプル", "2024年度 第1四半期決算短信", "https://corp.example.jp/ir/1"),
            record("Acme, Inc.", "Results \"Q1\", outlook\nrevised", "https://acme.example/n?a=1&b=2"),
        ];

        let outcome = write_records(&records, dir.path().to_str().unwrap(), &window())
            .await
            .unwrap();
        let PersistOutcome::Written { path, count } = outcome else {
            panic!("expected a written file");
        };

        assert_eq!(count, 2);
        assert!(path.ends_with("2024_05_09-2024_05_16.csv"));
        assert_eq!(read_records(&path).await, records);
    }

    #[tokio::test]
    async fn test_file_has_bom_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let records = vec![record("Acme", "Q1 Results", "https://acme.example/news/1")];

        write_records(&records, dir.path().to_str().unwrap(), &window())
            .await
            .unwrap();

        let bytes = std::fs::read(dir.path().join("2024_05_09-2024_05_16.csv")).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert_eq!(
            text,
            "company,title,url\nAcme,Q1 Results,https://acme.example/news/1\n"
        );
    }
}
