use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use derive_setters::Setters;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{DeskError, PAGE_SIZES};
use crate::record::RecordKind;

pub const DEFAULT_CONFIG_PATH: &str = "~/.rdesk/config.yml";
const DEFAULT_SESSION_PATH: &str = "~/.rdesk/session";
const DEFAULT_LOG_PATH: &str = "~/.rdesk/rdesk.log";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub retailers_path: String,
    pub distributors_path: String,
    pub bulk_upload_path: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: "http://localhost:5000".to_string(),
            retailers_path: "/api/retailers".to_string(),
            distributors_path: "/api/distributorsdetails".to_string(),
            bulk_upload_path: "/api/bullupload".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Shape of the YAML config file. Every key is optional.
#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct ConfigFile {
    pub base_url: Option<String>,
    pub retailers_path: Option<String>,
    pub distributors_path: Option<String>,
    #[serde(alias = "bullupload_path")]
    pub bulk_upload_path: Option<String>,
    pub timeout: Option<u64>,
    pub session_file: Option<String>,
    pub log_file: Option<String>,
    pub page_size: Option<usize>,
    pub kind: Option<RecordKind>,
    pub event_poll_time: Option<u64>,
    pub max_column_width: Option<usize>,
}

impl ConfigFile {
    /// A missing file at the default location is not an error.
    pub fn load(path: Option<&str>) -> Result<ConfigFile, DeskError> {
        let explicit = path.is_some();
        let path = expand_path(path.unwrap_or(DEFAULT_CONFIG_PATH))?;
        match fs::read_to_string(&path) {
            Ok(content) => {
                debug!("Loading config from {}", path.display());
                Ok(serde_yaml::from_str(&content)?)
            }
            Err(e) if e.kind() == ErrorKind::NotFound && !explicit => Ok(ConfigFile::default()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(DeskError::FileNotFound),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Setters)]
#[setters(prefix = "with_")]
pub struct DeskConfig {
    pub backend: BackendConfig,
    pub session_file: PathBuf,
    pub log_file: PathBuf,
    pub page_size: usize,
    pub kind: RecordKind,
    pub event_poll_time: u64,
    pub max_column_width: usize,
}

impl DeskConfig {
    pub fn defaults() -> Result<Self, DeskError> {
        Ok(DeskConfig {
            backend: BackendConfig::default(),
            session_file: expand_path(DEFAULT_SESSION_PATH)?,
            log_file: expand_path(DEFAULT_LOG_PATH)?,
            page_size: PAGE_SIZES[0],
            kind: RecordKind::default(),
            event_poll_time: 100,
            max_column_width: 40,
        })
    }

    /// Layers the values of a config file over the defaults.
    pub fn from_file(file: ConfigFile) -> Result<Self, DeskError> {
        let mut config = DeskConfig::defaults()?;
        let backend = &mut config.backend;
        if let Some(url) = file.base_url {
            backend.base_url = url;
        }
        if let Some(path) = file.retailers_path {
            backend.retailers_path = path;
        }
        if let Some(path) = file.distributors_path {
            backend.distributors_path = path;
        }
        if let Some(path) = file.bulk_upload_path {
            backend.bulk_upload_path = path;
        }
        if let Some(timeout) = file.timeout {
            backend.timeout_secs = timeout;
        }
        if let Some(path) = file.session_file {
            config.session_file = expand_path(&path)?;
        }
        if let Some(path) = file.log_file {
            config.log_file = expand_path(&path)?;
        }
        if let Some(size) = file.page_size {
            if !PAGE_SIZES.contains(&size) {
                return Err(DeskError::Validation(format!(
                    "page_size must be one of {PAGE_SIZES:?}, got {size}"
                )));
            }
            config.page_size = size;
        }
        if let Some(kind) = file.kind {
            config.kind = kind;
        }
        if let Some(poll) = file.event_poll_time {
            config.event_poll_time = poll;
        }
        if let Some(width) = file.max_column_width {
            config.max_column_width = width;
        }
        Ok(config)
    }
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(path: &str) -> Result<PathBuf, DeskError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| DeskError::Validation(format!("cannot expand {path}: {e}")))
}

pub fn ensure_parent(path: &Path) -> Result<(), DeskError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_values_override_defaults() {
        let file: ConfigFile = serde_yaml::from_str(
            "base_url: http://backend:8080\nbullupload_path: /api/upload\npage_size: 10\nkind: distributor\n",
        )
        .unwrap();
        let config = DeskConfig::from_file(file).unwrap();
        assert_eq!(config.backend.base_url, "http://backend:8080");
        assert_eq!(config.backend.bulk_upload_path, "/api/upload");
        assert_eq!(config.backend.retailers_path, "/api/retailers");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.kind, RecordKind::Distributor);
    }

    #[test]
    fn rejects_unknown_page_size() {
        let file = ConfigFile {
            page_size: Some(7),
            ..ConfigFile::default()
        };
        assert!(matches!(
            DeskConfig::from_file(file),
            Err(DeskError::Validation(_))
        ));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        assert!(matches!(
            ConfigFile::load(Some("/definitely/not/here.yml")),
            Err(DeskError::FileNotFound)
        ));
    }

    #[test]
    fn setters_chain() {
        let config = DeskConfig::defaults().unwrap().with_page_size(15);
        assert_eq!(config.page_size, 15);
    }
}
