//! Configuration for media onboarding.
//!
//! Values are layered, later sources overriding earlier ones:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. a configuration file (TOML, YAML or JSON, chosen by extension),
//! 3. environment variables prefixed with `MEDIA_`, with `__` separating
//!    nested keys (`MEDIA_GATHER__FINGERPRINT=blake3`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use media_lookup::{ConflictPolicy, ExtractionRule};
use media_signature::{Approach, FingerprintAlgorithm};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "MEDIA_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gather: GatherConfig,
    pub lookup: LookupConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatherConfig {
    /// Perceptual hashes to compute for every image.
    pub approaches: Vec<Approach>,
    /// Content digest recorded as each image's fingerprint.
    pub fingerprint: FingerprintAlgorithm,
    /// Only crawl beneath this key.
    pub prefix: Option<PathBuf>,
    /// External text extraction program. Extraction is skipped when unset.
    pub text: Option<TextCommand>,
}

impl Default for GatherConfig {
    fn default() -> Self {
        Self {
            approaches: Approach::DEFAULT.to_vec(),
            fingerprint: FingerprintAlgorithm::default(),
            prefix: None,
            text: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextCommand {
    /// Program name (looked up on `PATH`) or path.
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Git repositories holding existing records.
    pub repositories: Vec<String>,
    /// Storage URIs holding existing records.
    pub containers: Vec<String>,
    pub rules: Vec<ExtractionRule>,
    pub conflicts: ConflictPolicy,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            containers: Vec::new(),
            rules: vec![ExtractionRule::fingerprint()],
            conflicts: ConflictPolicy::default(),
        }
    }
}

impl Config {
    /// Load the configuration.
    ///
    /// With `path`, that file must exist. Without, the file at
    /// [`default_path`] is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) if !path.is_file() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => default_path().filter(|path| path.is_file()),
        };
        Self::extract(Self::figment(file.as_deref())?)
    }

    /// The layered sources, before extraction.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Loading configuration file");
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(file.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate a configuration from `figment`.
    pub fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.gather.approaches.is_empty() {
            exn::bail!(ErrorKind::Invalid("gather.approaches must not be empty".to_string()));
        }
        if self.lookup.rules.is_empty() {
            exn::bail!(ErrorKind::Invalid("lookup.rules must not be empty".to_string()));
        }
        if let Some(text) = &self.gather.text
            && text.program.trim().is_empty()
        {
            exn::bail!(ErrorKind::Invalid("gather.text.program must not be empty".to_string()));
        }
        Ok(())
    }
}

/// `config.toml` in the platform's configuration directory for this tool.
pub fn default_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "media").map(|dirs| dirs.config_dir().join("config.toml"))
}
