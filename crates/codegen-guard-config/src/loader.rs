//! Locating and reading configuration documents

use std::path::{Path, PathBuf};

use crate::{Config, ConfigError, Result, defaults::CONFIG_FILE_NAMES};

/// Document formats the loader reads, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Json,
}

impl ConfigFormat {
    /// Format of `path`, from its extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        match extension.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(ConfigFormat::Yaml),
            "json" => Ok(ConfigFormat::Json),
            _ => Err(ConfigError::UnsupportedFormat {
                extension: extension.to_string(),
            }),
        }
    }

    /// Parse and validate a document in this format
    pub fn parse(self, contents: &str) -> Result<Config> {
        match self {
            ConfigFormat::Yaml => Config::from_yaml(contents),
            ConfigFormat::Json => Config::from_json(contents),
        }
    }
}

/// Finds the guard configuration in a caller-supplied list of directories
///
/// Nothing is read from the process environment; the embedding host decides
/// where configuration may come from. Each directory is checked for the
/// names in [`CONFIG_FILE_NAMES`], and the first hit wins.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    search_paths: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader with no search paths
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader over `paths`, checked in order
    pub fn with_search_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        ConfigLoader {
            search_paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Append a directory to check after the existing ones
    pub fn add_search_path<P: Into<PathBuf>>(&mut self, path: P) -> &mut Self {
        self.search_paths.push(path.into());
        self
    }

    /// Directories checked, in order
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    /// First configuration file present in the search paths
    pub fn find(&self) -> Option<PathBuf> {
        self.search_paths
            .iter()
            .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
            .find(|candidate| candidate.is_file())
    }

    /// The defaults, overlaid with the first configuration file found
    pub fn load(&self) -> Result<Config> {
        let mut config = Config::default();

        match self.find() {
            Some(path) => config.merge(self.load_file(&path)?)?,
            None => tracing::debug!(
                searched = self.search_paths.len(),
                "no configuration file found, using defaults"
            ),
        }

        config.validate()?;
        Ok(config)
    }

    /// Read one configuration file, its format chosen by extension
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path)?;
        tracing::debug!(path = %path.display(), ?format, "loading configuration");
        let contents =
            std::fs::read_to_string(path).map_err(|err| ConfigError::io(path, err))?;
        format.parse(&contents)
    }
}
