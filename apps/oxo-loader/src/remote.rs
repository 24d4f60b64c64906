//! # External Metadata
//!
//! Resolves `--metadata` arguments: a local YAML file or an `http(s)` URL.

use oxo_core::OxoError;
use oxo_core::preprocess::metadata::Metadata;
use std::path::Path;

/// Whether `source` names a remote document.
#[must_use]
pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetch and parse a metadata document from a path or URL.
pub async fn fetch_metadata(source: &str) -> Result<Metadata, OxoError> {
    if !is_remote(source) {
        return Metadata::read_file(Path::new(source));
    }

    tracing::info!("Fetching metadata from {}", source);
    let resp = reqwest::get(source)
        .await
        .map_err(|e| OxoError::Connectivity(format!("{}: {e}", source)))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(OxoError::Connectivity(format!(
            "{} returned HTTP {}",
            source,
            status.as_u16()
        )));
    }

    let text = resp
        .text()
        .await
        .map_err(|e| OxoError::Connectivity(format!("{}: {e}", source)))?;
    Metadata::parse_yaml(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_urls() {
        assert!(is_remote("https://example.org/meta.yml"));
        assert!(is_remote("http://example.org/meta.yml"));
        assert!(!is_remote("meta.yml"));
        assert!(!is_remote("/data/https.yml"));
    }

    #[tokio::test]
    async fn local_files_are_read_directly() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = temp.path().join("meta.yml");
        std::fs::write(&path, "mapping_date: 2021-12-31\n").expect("write");

        let metadata = fetch_metadata(&path.to_string_lossy()).await.expect("fetch");

        assert!(metadata.mapping_date().expect("date").is_some());
    }

    #[tokio::test]
    async fn missing_local_file_is_an_io_error() {
        let result = fetch_metadata("/nonexistent/oxo/meta.yml").await;
        assert!(matches!(result, Err(OxoError::IoError(_))));
    }
}
