use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};

use crate::prompts::PromptProfile;

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_ORIGIN_SUFFIX: &str = ".github.io";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Everything the gateway reads from the environment, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub openai_api_key: String,
    pub openai_api_base: String,
    pub upstream_timeout: Option<Duration>,
    pub profile: PromptProfile,
    pub trusted_origin_suffix: String,
    pub static_dir: Option<PathBuf>,
    pub upload: Option<UploadConfig>,
    pub max_upload_bytes: usize,
}

/// Present only when the `/upload` route is enabled.
#[derive(Debug, Clone)]
pub struct UploadConfig {
    pub public_base_url: String,
    /// Filesystem root for blobs; `None` keeps uploads in memory.
    pub blob_dir: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let openai_api_key = get("OPENAI_API_KEY").ok_or_else(|| anyhow!("OPENAI_API_KEY is not set"))?;
        let openai_api_base = get("OPENAI_API_BASE")
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        let port = parse_opt::<u16>(get("PORT"), "PORT")?.unwrap_or(8080);
        let max_upload_bytes = parse_opt::<usize>(get("MAX_UPLOAD_BYTES"), "MAX_UPLOAD_BYTES")?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let upstream_timeout = parse_opt::<u64>(get("UPSTREAM_TIMEOUT_SECS"), "UPSTREAM_TIMEOUT_SECS")?
            .map(Duration::from_secs);

        let profile = match get("PROMPT_PROFILE") {
            Some(name) => name.parse::<PromptProfile>()?,
            None => PromptProfile::default(),
        };

        let upload = get("BLOB_PUBLIC_BASE_URL").map(|public_base_url| UploadConfig {
            public_base_url,
            blob_dir: get("BLOB_DIR").map(PathBuf::from),
        });

        Ok(Self {
            port,
            openai_api_key,
            openai_api_base,
            upstream_timeout,
            profile,
            trusted_origin_suffix: get("TRUSTED_ORIGIN_SUFFIX").unwrap_or_else(|| DEFAULT_ORIGIN_SUFFIX.to_string()),
            static_dir: get("STATIC_DIR").map(PathBuf::from),
            upload,
            max_upload_bytes,
        })
    }

    /// Key prefix safe to log.
    pub fn masked_api_key(&self) -> String {
        let shown: String = self.openai_api_key.chars().take(6).collect();
        format!("{shown}...")
    }
}

fn parse_opt<T>(value: Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .map(|v| v.parse::<T>().with_context(|| format!("invalid value for {key}: {v:?}")))
        .transpose()
}
