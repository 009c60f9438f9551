use super::models::{Config, GithubConfig, ServerConfig};
use reqwest::Url;
use thiserror::Error;

/// Largest accepted `max_header_bytes`
const MAX_HEADER_LIMIT: u64 = 64 * 1024 * 1024;

/// Largest accepted `max_headers`
const MAX_HEADER_COUNT: usize = 65_536;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Timeout must be positive: {field} = {value}")]
    InvalidTimeout { field: &'static str, value: u64 },

    #[error("max_header_bytes ({actual}) must be between 1 and {limit}")]
    InvalidHeaderLimit { actual: u64, limit: u64 },

    #[error("max_headers ({actual}) must be between 1 and {limit}")]
    InvalidHeaderCount { actual: usize, limit: usize },

    #[error("GitHub API URL '{url}' is not an absolute http(s) URL")]
    InvalidApiUrl { url: String },

    #[error("GitHub user agent must not be empty")]
    EmptyUserAgent,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_server(&config.server)?;
    validate_github(&config.github)?;
    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ValidationError> {
    for (field, value) in [
        ("server.read_timeout_secs", server.read_timeout_secs),
        ("server.write_timeout_secs", server.write_timeout_secs),
        ("server.shutdown_timeout_secs", server.shutdown_timeout_secs),
    ] {
        if value == 0 {
            return Err(ValidationError::InvalidTimeout { field, value });
        }
    }

    let actual = server.max_header_bytes.as_u64();
    if actual == 0 || actual > MAX_HEADER_LIMIT {
        return Err(ValidationError::InvalidHeaderLimit {
            actual,
            limit: MAX_HEADER_LIMIT,
        });
    }

    if server.max_headers == 0 || server.max_headers > MAX_HEADER_COUNT {
        return Err(ValidationError::InvalidHeaderCount {
            actual: server.max_headers,
            limit: MAX_HEADER_COUNT,
        });
    }

    Ok(())
}

fn validate_github(github: &GithubConfig) -> Result<(), ValidationError> {
    let url_ok = Url::parse(&github.api_url)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false);
    if !url_ok {
        return Err(ValidationError::InvalidApiUrl {
            url: github.api_url.clone(),
        });
    }

    if github.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }

    if github.connect_timeout_secs == 0 {
        return Err(ValidationError::InvalidTimeout {
            field: "github.connect_timeout_secs",
            value: 0,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.server.write_timeout_secs = 0;

        let result = validate(&config);
        assert!(matches!(
            result,
            Err(ValidationError::InvalidTimeout {
                field: "server.write_timeout_secs",
                value: 0
            })
        ));
    }

    #[test]
    fn test_header_limit_bounds() {
        let mut config = Config::default();
        config.server.max_header_bytes = ByteSize(0);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidHeaderLimit { actual: 0, .. })
        ));

        config.server.max_header_bytes = ByteSize(MAX_HEADER_LIMIT + 1);
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidHeaderLimit { .. })
        ));

        config.server.max_header_bytes = ByteSize(MAX_HEADER_LIMIT);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_header_count_bounds() {
        let mut config = Config::default();
        config.server.max_headers = 0;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidHeaderCount { actual: 0, .. })
        ));

        config.server.max_headers = MAX_HEADER_COUNT + 1;
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidHeaderCount { .. })
        ));

        config.server.max_headers = 150;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_api_url_must_be_http() {
        let mut config = Config::default();

        config.github.api_url = "ftp://example.com".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidApiUrl { .. })
        ));

        config.github.api_url = "api.github.com".to_string();
        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidApiUrl { .. })
        ));

        config.github.api_url = "http://localhost:3000".to_string();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_empty_user_agent_rejected() {
        let mut config = Config::default();
        config.github.user_agent = "  ".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyUserAgent)
        ));
    }
}
