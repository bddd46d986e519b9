use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://www.cambridge.org";
pub const DEFAULT_RESOLVER_URL: &str = "https://doi.org/";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const DEFAULT_USER_AGENT: &str = concat!("corebook/", env!("CARGO_PKG_VERSION"));

/// Everything one run needs, after CLI parsing and environment overrides.
#[derive(Debug, Clone)]
pub struct Config {
    pub doi: String,
    pub output_root: PathBuf,
    pub epub: bool,
    /// Chapter links in the directory are resolved against this.
    pub base_url: Url,
    pub resolver_url: Url,
    pub user_agent: String,
    pub timeout: Duration,
}

impl Config {
    /// Reads `COREBOOK_*` overrides from the environment.
    pub fn from_env(doi: &str, output_root: PathBuf, epub: bool) -> anyhow::Result<Self> {
        let doi = normalize_doi(doi).with_context(|| format!("invalid DOI: {doi:?}"))?;

        let base_url = std::env::var("COREBOOK_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let base_url = Url::parse(&base_url)
            .with_context(|| format!("parse COREBOOK_BASE_URL: {base_url}"))?;

        let resolver_url = std::env::var("COREBOOK_RESOLVER_URL")
            .unwrap_or_else(|_| DEFAULT_RESOLVER_URL.to_owned());
        let resolver_url = Url::parse(&with_trailing_slash(&resolver_url))
            .with_context(|| format!("parse COREBOOK_RESOLVER_URL: {resolver_url}"))?;

        let user_agent = std::env::var("COREBOOK_USER_AGENT")
            .unwrap_or_else(|_| DEFAULT_USER_AGENT.to_owned());

        let timeout = match std::env::var("COREBOOK_TIMEOUT_SECS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("parse COREBOOK_TIMEOUT_SECS: {raw}"))?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            doi,
            output_root,
            epub,
            base_url,
            resolver_url,
            user_agent,
            timeout: Duration::from_secs(timeout),
        })
    }

    pub fn doi_url(&self) -> anyhow::Result<Url> {
        self.resolver_url
            .join(&self.doi)
            .with_context(|| format!("build DOI URL for {}", self.doi))
    }
}

/// Accepts a bare DOI, `doi:` prefixed, or a resolver URL.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let bare = ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed)
        .trim();

    let (prefix, suffix) = bare.split_once('/')?;
    if !prefix.starts_with("10.") || suffix.is_empty() || bare.contains(char::is_whitespace) {
        return None;
    }
    Some(bare.to_owned())
}

fn with_trailing_slash(raw: &str) -> String {
    if raw.ends_with('/') {
        raw.to_owned()
    } else {
        format!("{raw}/")
    }
}
