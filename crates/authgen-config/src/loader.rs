use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat, Map};

use crate::{Result, Settings};

/// Prefix of environment overrides, e.g. `AUTHGEN__ENVOY__CLUSTER_NAME=idp`.
pub const ENV_PREFIX: &str = "AUTHGEN";

/// File picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "authgen.toml";

/// Builds [`Settings`] from defaults, a TOML file and the environment.
#[derive(Debug, Default)]
pub struct SettingsLoader {
    path: Option<PathBuf>,
    env_source: Option<Map<String, String>>,
}

impl SettingsLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read this file instead of `authgen.toml`. The file must exist.
    #[must_use]
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replace the process environment with a fixed map.
    #[must_use]
    pub fn with_env_source(mut self, source: Map<String, String>) -> Self {
        self.env_source = Some(source);
        self
    }

    pub fn load(self) -> Result<Settings> {
        let mut builder = Config::builder();
        match self.path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading settings file");
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            }
            None => {
                // Try default root-level file
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    tracing::debug!(path = DEFAULT_CONFIG_FILE, "Loading settings file");
                    builder = builder.add_source(File::from(default_path).format(FileFormat::Toml));
                }
            }
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(self.env_source),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Load settings from `path`, or from `authgen.toml` if present.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let mut loader = SettingsLoader::new();
    if let Some(path) = path {
        loader = loader.with_file(path);
    }
    loader.load()
}
