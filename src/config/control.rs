use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_SECURITYFS_DIR;
use crate::Error;
use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ControlConfig {
    /// Directory holding the kernel control files
    /// Default: "/sys/kernel/security/provenance"
    #[serde(default = "default_securityfs_dir")]
    pub securityfs_dir: PathBuf,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            securityfs_dir: default_securityfs_dir(),
        }
    }
}

impl ControlConfig {
    /// # Errors
    /// Returns `Error::Config` when the control directory is empty or relative
    pub fn validate(&self) -> Result<()> {
        if self.securityfs_dir.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "control.securityfs_dir cannot be empty".into(),
            )));
        }
        if self.securityfs_dir.is_relative() {
            return Err(Error::Config(ConfigError::Message(format!(
                "control.securityfs_dir must be absolute, got {}",
                self.securityfs_dir.display()
            ))));
        }
        Ok(())
    }
}

fn default_securityfs_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SECURITYFS_DIR)
}
