use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::reconcile::batch::EditPolicy;

fn default_api_url() -> String {
    "http://localhost:8087/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Holds the feature cache and the session token.
    pub data_dir: PathBuf,
    #[serde(default)]
    pub edit_policy: EditPolicy,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_file(filepath: &Path) -> anyhow::Result<Self> {
        if !filepath.exists() {
            return Err(anyhow!("Config file {:?} not found", filepath));
        }
        let config_contents = read_to_string(filepath)?;
        serde_yaml::from_str(&config_contents)
            .with_context(|| format!("Parsing config file {:?}", filepath))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
