use std::time::Duration;

use serde::Deserialize;
use url::Url;

#[derive(Deserialize, Clone, Debug)]
#[serde(tag = "type")]
pub enum StoreConfig {
    GoogleDrive {
        #[serde(default = "default_token_env")]
        token_env: String,
        #[serde(default)]
        api_base: Option<Url>,
        #[serde(default)]
        upload_base: Option<Url>,
    },
    Local {
        url: String,
    },
}

fn default_token_env() -> String {
    "DRIVE_ACCESS_TOKEN".to_owned()
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(tag = "type")]
pub enum CacheBackend {
    Redis {
        url: String,
        #[serde(default)]
        prefix: Option<String>,
    },
    #[default]
    Memory,
    Disabled,
}

#[derive(Deserialize, Clone, Debug)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn default_ttl_secs() -> u64 {
    300
}

#[derive(Deserialize, Clone, Debug)]
pub struct UploadConfig {
    #[serde(default = "num_cpus::get")]
    pub concurrency: usize,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_read_batch")]
    pub read_batch: usize,
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            concurrency: num_cpus::get(),
            settle_delay_ms: default_settle_delay_ms(),
            read_batch: default_read_batch(),
            exclude: Vec::new(),
        }
    }
}

impl UploadConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn default_settle_delay_ms() -> u64 {
    2500
}

fn default_read_batch() -> usize {
    64
}

#[derive(Deserialize, Clone, Debug)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        if self.upload.concurrency == 0 {
            return Err("upload.concurrency must be at least 1".to_owned());
        }
        if self.upload.read_batch == 0 {
            return Err("upload.read_batch must be at least 1".to_owned());
        }
        if self.cache.ttl_secs == 0 && !matches!(self.cache.backend, CacheBackend::Disabled) {
            return Err("cache.ttl_secs must be positive while caching is enabled".to_owned());
        }
        for pattern in &self.upload.exclude {
            glob::Pattern::new(pattern)
                .map_err(|e| format!("invalid exclude pattern {pattern:?}: {e}"))?;
        }
        if let StoreConfig::Local { url } = &self.store {
            if !url.starts_with("sqlite:") {
                return Err(format!("local store url must be a sqlite url: {url}"));
            }
        }
        Ok(())
    }
}
