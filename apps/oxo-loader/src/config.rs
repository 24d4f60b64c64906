//! # Configuration
//!
//! `oxo.toml` plus environment and command-line overrides.
//!
//! Precedence, lowest first: file, `OXO_STORE_URL`, `--store`.

use oxo_core::{
    BatchLimits, DatasourceDefaults, OxoError, PipelineMode, StoreLocator, UpsertLoader,
    WipeController,
};
use serde::Deserialize;
use std::path::Path;

/// Config file read when `-c` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "oxo.toml";

/// Environment variable overriding `[store] url`.
pub const STORE_URL_ENV: &str = "OXO_STORE_URL";

/// `[store]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub url: Option<String>,
}

/// `[datasource_defaults]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    pub source_type: Option<String>,
    pub licence: Option<String>,
    pub description: Option<String>,
    pub version_info: Option<String>,
}

/// `[preprocess]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreprocessConfig {
    pub mode: Option<PipelineMode>,
}

/// `[load]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Rows per store transaction.
    pub commit_rows: Option<usize>,
}

/// `[wipe]` batch ceilings per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WipeConfig {
    pub relationships: Option<usize>,
    pub terms: Option<usize>,
    pub datasources: Option<usize>,
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub store: StoreConfig,
    pub datasource_defaults: DefaultsConfig,
    pub preprocess: PreprocessConfig,
    pub load: LoadConfig,
    pub wipe: WipeConfig,
}

impl Config {
    /// Parse TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, OxoError> {
        toml::from_str(text).map_err(|e| OxoError::Configuration(e.to_string()))
    }

    /// Load a config file.
    ///
    /// A missing file yields the defaults unless `explicit` is set, in which
    /// case it is a configuration error.
    pub fn load(path: &Path, explicit: bool) -> Result<Self, OxoError> {
        if !path.exists() {
            if explicit {
                return Err(OxoError::Configuration(format!(
                    "config file {} not found",
                    path.display()
                )));
            }
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| OxoError::Configuration(format!("read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    /// Apply environment overrides using `lookup` to read variables.
    #[must_use]
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(STORE_URL_ENV).filter(|u| !u.trim().is_empty()) {
            self.store.url = Some(url);
        }
        self
    }

    /// Apply a `--store` override.
    #[must_use]
    pub fn with_store_url(mut self, url: Option<String>) -> Self {
        if url.is_some() {
            self.store.url = url;
        }
        self
    }

    /// The configured store, or a configuration error if there is none.
    pub fn store_locator(&self) -> Result<StoreLocator, OxoError> {
        match self.store.url.as_deref() {
            Some(url) => StoreLocator::parse(url),
            None => Err(OxoError::Configuration(format!(
                "no store configured: set [store] url, {} or --store",
                STORE_URL_ENV
            ))),
        }
    }

    /// Datasource defaults for the loader.
    #[must_use]
    pub fn datasource_defaults(&self) -> DatasourceDefaults {
        let defaults = &self.datasource_defaults;
        let base = DatasourceDefaults::default();
        DatasourceDefaults {
            source_type: defaults.source_type.clone().unwrap_or(base.source_type),
            licence: defaults.licence.clone(),
            description: defaults.description.clone(),
            version_info: defaults.version_info.clone(),
        }
    }

    /// The loader: datasource defaults plus chunk size.
    #[must_use]
    pub fn upsert_loader(&self) -> UpsertLoader {
        let loader = UpsertLoader::new(self.datasource_defaults());
        match self.load.commit_rows {
            Some(rows) => loader.with_commit_rows(rows),
            None => loader,
        }
    }

    /// The wipe controller, compiled-in ceilings unless overridden.
    #[must_use]
    pub fn wipe_controller(&self) -> WipeController {
        let base = BatchLimits::default();
        WipeController::with_limits(BatchLimits {
            relationships: self.wipe.relationships.unwrap_or(base.relationships),
            terms: self.wipe.terms.unwrap_or(base.terms),
            datasources: self.wipe.datasources.unwrap_or(base.datasources),
        })
    }

    /// Preprocess mode, defaulting to legacy.
    #[must_use]
    pub fn pipeline_mode(&self) -> PipelineMode {
        self.preprocess.mode.unwrap_or_default()
    }
}

// =============================================================================
// TESTS
// =============================================================================
