// Copyright (c) The riskshard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for riskshard.
//!
//! Configuration is layered: the default config embedded in the binary comes first, and a
//! repository-specific file is merged on top of it.

use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;

/// Overall configuration for riskshard.
#[derive(Clone, Debug)]
pub struct RiskshardConfig {
    project_root: Utf8PathBuf,
    inner: RiskshardConfigImpl,
}

impl RiskshardConfig {
    /// The default location of the config within the project root: `.config/riskshard.toml`.
    pub const CONFIG_PATH: &'static str = ".config/riskshard.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Repository-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the riskshard config from the given file, or if not specified from
    /// `.config/riskshard.toml` in the project root.
    ///
    /// If no config file is specified and the project doesn't have `.config/riskshard.toml`, uses
    /// the default config options.
    pub fn from_sources(
        project_root: impl Into<Utf8PathBuf>,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let project_root = project_root.into();

        let (config_file, source) = match config_file {
            Some(file) => (file.to_owned(), File::new(file.as_str(), FileFormat::Toml)),
            None => {
                let config_file = project_root.join(Self::CONFIG_PATH);
                let source = File::new(config_file.as_str(), FileFormat::Toml).required(false);
                (config_file, source)
            }
        };

        let builder = Self::make_default_config().add_source(source);
        let inner = Self::build_and_deserialize_config(&builder)
            .and_then(|inner| inner.validate().map(|()| inner))
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        tracing::debug!(
            config_file = %config_file,
            source_roots = ?inner.mapper.source_roots,
            "loaded riskshard config",
        );

        Ok(Self {
            project_root,
            inner,
        })
    }

    /// Returns the default riskshard config.
    pub fn default_config(project_root: impl Into<Utf8PathBuf>) -> Self {
        let inner = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");
        Self {
            project_root: project_root.into(),
            inner,
        }
    }

    /// Returns the project root this config was loaded for.
    pub fn project_root(&self) -> &Utf8Path {
        &self.project_root
    }

    /// Returns the test-to-source mapper settings.
    pub fn mapper(&self) -> &MapperConfig {
        &self.inner.mapper
    }

    /// Returns the test discovery settings.
    pub fn discovery(&self) -> &DiscoveryConfig {
        &self.inner.discovery
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<RiskshardConfigImpl, ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|err| ConfigParseErrorKind::BuildError(Box::new(err)))?;

        serde_path_to_error::deserialize(config)
            .map_err(|err| ConfigParseErrorKind::DeserializeError(Box::new(err)))
    }
}

/// Settings for [`TestSourceMapper`](crate::mapper::TestSourceMapper).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct MapperConfig {
    /// Directories relative to the project root that are searched for source files, in order.
    /// The project root is always searched after these.
    pub source_roots: Vec<Utf8PathBuf>,

    /// Whether to drop import resolutions that land outside the project root.
    pub contain_imports: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            source_roots: vec!["src".into(), "lib".into()],
            contain_imports: false,
        }
    }
}

/// Settings for [`discover_test_files`](crate::discovery::discover_test_files).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// Glob patterns relative to the project root that identify test files.
    pub test_patterns: Vec<String>,

    /// Directory names that are never descended into.
    pub ignore_dirs: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RiskshardConfigImpl {
    mapper: MapperConfig,
    discovery: DiscoveryConfig,
}

impl RiskshardConfigImpl {
    fn validate(&self) -> Result<(), ConfigParseErrorKind> {
        for root in &self.mapper.source_roots {
            let escapes = root.is_absolute()
                || root
                    .components()
                    .any(|c| matches!(c, Utf8Component::ParentDir | Utf8Component::Prefix(_)));
            if escapes {
                return Err(ConfigParseErrorKind::InvalidSourceRoot { root: root.clone() });
            }
        }
        Ok(())
    }
}
