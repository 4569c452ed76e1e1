use serde::Deserialize;
use std::time::Duration;

/// Runtime configuration, loaded once at start-up.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Operator credential accepted on `/api/v1/*`.
    pub operator_username: String,
    pub operator_password: String,
    pub kyc_base_url: String,
    pub scoring_base_url: String,
    /// Basic-auth credential presented to both the KYC and scoring services.
    pub service_user: String,
    pub service_pass: String,
    pub scoring_max_retries: u32,
    pub scoring_retry_delay_secs: u64,
    pub http_timeout_secs: u64,
    pub max_concurrent_workflows: usize,
    pub shutdown_grace_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: parse_or_default("PORT", 5000)
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            operator_username: required("USERNAME")?,
            operator_password: required("PASSWORD")?,
            kyc_base_url: required_url("SOAP_KYC_URL")?,
            scoring_base_url: required_url("SCORING_URL")?,
            service_user: required("SOAP_USER")?,
            service_pass: required("SOAP_PASS")?,
            scoring_max_retries: parse_or_default("SCORING_MAX_RETRIES", 3)
                .map_err(|_| anyhow::anyhow!("SCORING_MAX_RETRIES must be a positive integer"))
                .and_then(|n: u32| {
                    if n == 0 {
                        anyhow::bail!("SCORING_MAX_RETRIES must be at least 1");
                    }
                    Ok(n)
                })?,
            scoring_retry_delay_secs: parse_or_default("SCORING_RETRY_DELAY_SECS", 3)
                .map_err(|_| anyhow::anyhow!("SCORING_RETRY_DELAY_SECS must be a number"))?,
            http_timeout_secs: parse_or_default("HTTP_TIMEOUT_SECS", 30)
                .map_err(|_| anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a number"))?,
            max_concurrent_workflows: parse_or_default("MAX_CONCURRENT_WORKFLOWS", 64)
                .map_err(|_| anyhow::anyhow!("MAX_CONCURRENT_WORKFLOWS must be a number"))
                .and_then(|n: usize| {
                    if n == 0 {
                        anyhow::bail!("MAX_CONCURRENT_WORKFLOWS must be at least 1");
                    }
                    Ok(n)
                })?,
            shutdown_grace_secs: parse_or_default("SHUTDOWN_GRACE_SECS", 30)
                .map_err(|_| anyhow::anyhow!("SHUTDOWN_GRACE_SECS must be a number"))?,
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("KYC URL: {}", config.kyc_base_url);
        tracing::debug!("Scoring URL: {}", config.scoring_base_url);
        tracing::debug!(
            "Scoring polls: {} attempts, {}s apart",
            config.scoring_max_retries,
            config.scoring_retry_delay_secs
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn scoring_retry_delay(&self) -> Duration {
        Duration::from_secs(self.scoring_retry_delay_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    let value = std::env::var(name)
        .map_err(|_| anyhow::anyhow!("{} environment variable required", name))?;
    if value.trim().is_empty() {
        anyhow::bail!("{} cannot be empty", name);
    }
    Ok(value)
}

fn required_url(name: &str) -> anyhow::Result<String> {
    let url = required(name)?;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(url.trim_end_matches('/').to_string())
}

fn parse_or_default<T: std::str::FromStr>(name: &str, default: T) -> Result<T, T::Err> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse(),
        _ => Ok(default),
    }
}
