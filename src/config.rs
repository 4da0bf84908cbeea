//! Loading of the companies and selector tables.
//!
//! Both tables are UTF-8 CSV files with a header row; a leading byte-order
//! mark is ignored.
//!
//! | File | Columns |
//! |------|---------|
//! | companies | `company,url` |
//! | selectors | `company,list_selector,title_selector,date_selector,link_selector` |
//!
//! The companies table is required: the run cannot do anything without it.
//! The selector table is optional and every problem with it degrades the
//! affected sites to the generic strategy instead of failing.

use crate::models::SiteConfig;
use crate::selectors::{SelectorRow, SelectorTable};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Selector table picked up from the working directory when none is given.
pub const DEFAULT_SELECTOR_FILE: &str = "selectors.csv";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed table {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{} has no '{column}' column", .path.display())]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{} contains no usable rows", .path.display())]
    Empty { path: PathBuf },
}

#[derive(Debug, Deserialize)]
struct CompanyRecord {
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SelectorRecord {
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    list_selector: Option<String>,
    #[serde(default)]
    title_selector: Option<String>,
    #[serde(default)]
    date_selector: Option<String>,
    #[serde(default)]
    link_selector: Option<String>,
}

/// Load the companies table.
///
/// Rows without a company name or URL are skipped with a warning.
///
/// # Errors
///
/// Fails when the file cannot be read, has no `company` / `url` header, or
/// yields no usable row.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn load_sites(path: &Path) -> Result<Vec<SiteConfig>, ConfigError> {
    let bytes = fs::read(path).await.map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = csv_reader(&bytes);
    let csv_error = |source| ConfigError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let headers = reader.headers().map_err(csv_error)?.clone();
    for column in ["company", "url"] {
        if !headers.iter().any(|h| h == column) {
            return Err(ConfigError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    let mut sites = Vec::new();
    for (index, row) in reader.deserialize::<CompanyRecord>().enumerate() {
        // header is line 1
        let line = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(line, error = %e, "Skipping unreadable companies row");
                continue;
            }
        };
        match (non_empty(row.company), non_empty(row.url)) {
            (Some(company), Some(url)) => sites.push(SiteConfig { company, url }),
            _ => warn!(line, "Skipping companies row without company or url"),
        }
    }

    if sites.is_empty() {
        return Err(ConfigError::Empty {
            path: path.to_path_buf(),
        });
    }
    info!(count = sites.len(), "Loaded companies");
    Ok(sites)
}

/// Load the selector table.
///
/// With no explicit path, [`DEFAULT_SELECTOR_FILE`] is used when it exists.
/// Any failure yields an empty table, which makes every site generic.
#[instrument(level = "info", skip_all)]
pub async fn load_selector_table(path: Option<&Path>) -> SelectorTable {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_SELECTOR_FILE);
            if !fs::try_exists(&fallback).await.unwrap_or(false) {
                debug!("No selector table; all sites use the generic strategy");
                return SelectorTable::new();
            }
            fallback
        }
    };

    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read selector table; using generic strategy for all sites");
            return SelectorTable::new();
        }
    };

    let mut table = SelectorTable::new();
    for (index, row) in csv_reader(&bytes).deserialize::<SelectorRecord>().enumerate() {
        let line = index + 2;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(path = %path.display(), line, error = %e, "Skipping unreadable selector row");
                continue;
            }
        };
        let Some(company) = non_empty(row.company) else {
            warn!(path = %path.display(), line, "Skipping selector row without company");
            continue;
        };
        table.insert(
            company,
            SelectorRow {
                list_selector: row.list_selector,
                title_selector: row.title_selector,
                date_selector: row.date_selector,
                link_selector: row.link_selector,
            },
        );
    }

    info!(path = %path.display(), count = table.len(), "Loaded selector table");
    table
}

fn csv_reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(body)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::resolve;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn table_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_sites_with_bom_and_japanese_names() {
        let file = table_file(
            "\u{feff}company,url\n株式会社サンプル,https://corp.example.jp/ir/news/\nAcme,https://acme.example/news\n"
                .as_bytes(),
        );
        let sites = load_sites(file.path()).await.unwrap();

        assert_eq!(
            sites,
            vec![
                SiteConfig {
                    company: "株式会社サンプル".into(),
                    url: "https://corp.example.jp/ir/news/".into(),
                },
                SiteConfig {
                    company: "Acme".into(),
                    url: "https://acme.example/news".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_load_sites_skips_incomplete_rows() {
        let file = table_file(b"url,company\nhttps://a.example,A\n,B\nhttps://c.example,\nhttps://d.example, D \n");
        let sites = load_sites(file.path()).await.unwrap();

        let names: Vec<&str> = sites.iter().map(|s| s.company.as_str()).collect();
        assert_eq!(names, ["A", "D"]);
    }

    #[tokio::test]
    async fn test_load_sites_fatal_cases() {
        let missing = load_sites(Path::new("/nonexistent/companies.csv")).await;
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let file = table_file(b"name,link\nA,https://a.example\n");
        let err = load_sites(file.path()).await.unwrap_err();
        assert!(matches!(err, ConfigError::MissingColumn { column: "company", .. }));

        let file = table_file(b"company,url\n,\n");
        assert!(matches!(
            load_sites(file.path()).await,
            Err(ConfigError::Empty { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_selector_table() {
        let file = table_file(
            b"company,list_selector,title_selector,date_selector,link_selector\n\
              Acme,ul.news li,a,span.date,a\n\
              Globex,SKIP: requires JavaScript,,,\n\
              Initech,div.item,h3,regex:\\d{4}-\\d{2}-\\d{2},a\n\
              ,li,a,time,a\n",
        );
        let table = load_selector_table(Some(file.path())).await;

        assert_eq!(table.len(), 3);
        assert_eq!(resolve("Acme", &table).kind(), "specific");
        assert_eq!(resolve("Globex", &table).kind(), "skip");
        assert_eq!(resolve("Initech", &table).kind(), "specific");
        assert!(resolve("Unknown", &table).is_generic());
    }

    #[tokio::test]
    async fn test_short_selector_rows_are_incomplete() {
        let file = table_file(b"company,list_selector,title_selector,date_selector,link_selector\nAcme,li,a\n");
        let table = load_selector_table(Some(file.path())).await;

        let row = table.get("Acme").unwrap();
        assert_eq!(row.date_selector, None);
        assert!(resolve("Acme", &table).is_generic());
    }

    #[tokio::test]
    async fn test_unreadable_selector_table_is_empty() {
        let table = load_selector_table(Some(Path::new("/nonexistent/selectors.csv"))).await;
        assert!(table.is_empty());
    }
}
