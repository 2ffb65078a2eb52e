use std::path::{Path, PathBuf};
use std::{fmt, fs, io};

use tracing::debug;

pub(crate) const DEFAULT_HOST: &str = "http://localhost:9000";

fn default_host() -> String {
    String::from(DEFAULT_HOST)
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub(crate) struct ConfigFile {
    #[serde(default = "default_host")]
    pub(crate) host: String,
    #[serde(default)]
    pub(crate) api_token: Option<String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            host: default_host(),
            api_token: None,
        }
    }
}

// Keeps the token out of logs
impl fmt::Debug for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigFile")
            .field("host", &self.host)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigFileError {
    #[error("i/o error for config file at {}: {0}", .1.display())]
    Io(io::Error, PathBuf),
    #[error("toml error in config file: {0}")]
    Toml(#[from] toml::de::Error),
}

impl ConfigFile {
    pub(crate) fn from_file<P: AsRef<Path>>(p: P) -> Result<Self, ConfigFileError> {
        let path = p.as_ref();
        let s = fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e, path.to_path_buf()))?;
        Ok(toml::from_str::<ConfigFile>(&s)?)
    }

    pub(crate) fn load(path: Option<&Path>) -> Result<Self, ConfigFileError> {
        let conf = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        debug!(?conf);
        Ok(conf)
    }
}
