use anyhow::{Context, ensure};
use serde::Deserialize;
use std::path::Path;

/// Tunables for the request service.
///
/// Every key is optional in the TOML file; missing keys take the defaults
/// below.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Months a donor has to wait after a donation before claiming again.
    cooldown_months: u32,

    /// Page size used when a listing does not ask for one.
    default_page_limit: usize,

    /// Upper bound for a requested page size.
    max_page_limit: usize,

    /// Prefix of human readable request codes, e.g. `BR` in `BR-3F9A0C1D`.
    request_code_prefix: String,

    /// Number of hex characters after the prefix.
    request_code_length: usize,

    /// Days a claim may sit in `processing` before it is reported as stale.
    stale_claim_days: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cooldown_months: 3,
            default_page_limit: 10,
            max_page_limit: 100,
            request_code_prefix: "BR".to_string(),
            request_code_length: 8,
            stale_claim_days: 7,
        }
    }
}

impl Config {
    /// Loads the configuration from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML is invalid or
    /// the values are inconsistent.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content).context("failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.default_page_limit > 0, "default_page_limit must be positive");
        ensure!(
            self.default_page_limit <= self.max_page_limit,
            "default_page_limit ({}) exceeds max_page_limit ({})",
            self.default_page_limit,
            self.max_page_limit
        );
        ensure!(
            (4..=64).contains(&self.request_code_length),
            "request_code_length must be between 4 and 64"
        );
        ensure!(
            !self.request_code_prefix.trim().is_empty(),
            "request_code_prefix must not be empty"
        );
        Ok(())
    }

    #[must_use]
    pub const fn cooldown_months(&self) -> u32 {
        self.cooldown_months
    }
    #[must_use]
    pub const fn default_page_limit(&self) -> usize {
        self.default_page_limit
    }
    #[must_use]
    pub const fn max_page_limit(&self) -> usize {
        self.max_page_limit
    }
    #[must_use]
    pub fn request_code_prefix(&self) -> &str {
        &self.request_code_prefix
    }
    #[must_use]
    pub const fn request_code_length(&self) -> usize {
        self.request_code_length
    }
    #[must_use]
    pub const fn stale_claim_days(&self) -> u32 {
        self.stale_claim_days
    }

    pub fn with_cooldown_months(mut self, months: u32) -> Self {
        self.cooldown_months = months;
        self
    }
    pub fn with_page_limits(mut self, default: usize, max: usize) -> Self {
        self.default_page_limit = default;
        self.max_page_limit = max;
        self
    }
    pub fn with_request_code(mut self, prefix: &str, length: usize) -> Self {
        self.request_code_prefix = prefix.to_string();
        self.request_code_length = length;
        self
    }
    pub fn with_stale_claim_days(mut self, days: u32) -> Self {
        self.stale_claim_days = days;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config = Config::from_toml("cooldown_months = 4\n").unwrap();

        assert_eq!(config.cooldown_months(), 4);
        assert_eq!(config.default_page_limit(), 10);
        assert_eq!(config.request_code_prefix(), "BR");
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn inconsistent_limits_are_rejected() {
        let err = Config::from_toml("default_page_limit = 50\nmax_page_limit = 20\n").unwrap_err();
        assert!(err.to_string().contains("exceeds"));
        assert!(Config::from_toml("request_code_length = 2\n").is_err());
    }
}
