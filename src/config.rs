use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://classroom.googleapis.com/v1";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3000/auth/callback";

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub api_base: String,
    pub page_size: u32,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub session_file: PathBuf,
    pub assignments_file: PathBuf,
    pub log_level: String,
    pub late_alert_threshold: usize,
    pub low_completion_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            page_size: 100,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            session_file: PathBuf::from(".classroom_session.json"),
            assignments_file: PathBuf::from("teacher_assignments.yaml"),
            log_level: "info".to_string(),
            late_alert_threshold: 2,
            low_completion_threshold: 50.0,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let config = Config {
            client_id: non_empty_var("GOOGLE_CLIENT_ID"),
            client_secret: non_empty_var("GOOGLE_CLIENT_SECRET"),
            redirect_uri: non_empty_var("GOOGLE_REDIRECT_URI").unwrap_or(defaults.redirect_uri),
            api_base: non_empty_var("CLASSROOM_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or(defaults.api_base),
            page_size: parse_var("CLASSROOM_PAGE_SIZE")?.unwrap_or(defaults.page_size),
            request_timeout: parse_var::<u64>("REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            max_retries: parse_var("MAX_RETRIES")?.unwrap_or(defaults.max_retries),
            session_file: non_empty_var("SESSION_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.session_file),
            assignments_file: non_empty_var("ASSIGNMENTS_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.assignments_file),
            log_level: non_empty_var("LOG_LEVEL").unwrap_or(defaults.log_level),
            late_alert_threshold: parse_var("LATE_ALERT_THRESHOLD")?
                .unwrap_or(defaults.late_alert_threshold),
            low_completion_threshold: parse_var("LOW_COMPLETION_THRESHOLD")?
                .unwrap_or(defaults.low_completion_threshold),
        };

        if config.page_size == 0 {
            anyhow::bail!("CLASSROOM_PAGE_SIZE must be greater than zero");
        }
        if !(0.0..=100.0).contains(&config.low_completion_threshold) {
            anyhow::bail!("LOW_COMPLETION_THRESHOLD must be between 0 and 100");
        }

        Ok(config)
    }

    pub fn client_id(&self) -> Result<&str> {
        self.client_id
            .as_deref()
            .context("GOOGLE_CLIENT_ID not found. Please set it in .env file or environment")
    }

    pub fn client_secret(&self) -> Result<&str> {
        self.client_secret
            .as_deref()
            .context("GOOGLE_CLIENT_SECRET not found. Please set it in .env file or environment")
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty_var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.page_size, 100);
        assert_eq!(config.late_alert_threshold, 2);
        assert!(config.client_id().is_err());
    }

    #[test]
    fn parse_var_rejects_garbage() {
        env::set_var("CLASSROOM_DASHBOARD_TEST_NUMBER", "ten");
        assert!(parse_var::<u32>("CLASSROOM_DASHBOARD_TEST_NUMBER").is_err());
        env::set_var("CLASSROOM_DASHBOARD_TEST_NUMBER", " 10 ");
        assert_eq!(
            parse_var::<u32>("CLASSROOM_DASHBOARD_TEST_NUMBER").unwrap(),
            Some(10)
        );
        env::remove_var("CLASSROOM_DASHBOARD_TEST_NUMBER");
        assert_eq!(parse_var::<u32>("CLASSROOM_DASHBOARD_TEST_NUMBER").unwrap(), None);
    }
}
