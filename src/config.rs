use crate::error::{config::ConfigError, AppError};

const AEZA_API_URL: &str = "https://core.aeza.net/api";

/// Settings for synthesizing VLESS REALITY connection URIs when a panel
/// response carries no usable link.
#[derive(Clone)]
pub struct LinkConfig {
    pub reality_public_key: String,
    pub reality_sni: String,
    pub reality_short_id: String,
    pub reality_port: u16,
}

pub struct Config {
    pub database_url: String,

    pub notify_api_url: String,

    pub aeza_api_url: String,
    pub aeza_api_key: String,

    pub links: LinkConfig,
}

/// Rejects malformed endpoint URLs at startup instead of on the first request.
fn checked_url(value: String) -> Result<String, AppError> {
    url::Url::parse(&value)?;
    Ok(value)
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?,
            notify_api_url: checked_url(
                std::env::var("NOTIFY_API_URL")
                    .map_err(|_| ConfigError::MissingEnvVar("NOTIFY_API_URL".to_string()))?,
            )?,
            aeza_api_url: checked_url(
                std::env::var("AEZA_API_URL").unwrap_or_else(|_| AEZA_API_URL.to_string()),
            )?,
            aeza_api_key: std::env::var("AEZA_API_KEY")
                .map_err(|_| ConfigError::MissingEnvVar("AEZA_API_KEY".to_string()))?,
            links: LinkConfig {
                reality_public_key: std::env::var("REALITY_PUBLIC_KEY")
                    .map_err(|_| ConfigError::MissingEnvVar("REALITY_PUBLIC_KEY".to_string()))?,
                reality_sni: std::env::var("REALITY_SNI")
                    .map_err(|_| ConfigError::MissingEnvVar("REALITY_SNI".to_string()))?,
                reality_short_id: std::env::var("REALITY_SHORT_ID").unwrap_or_default(),
                reality_port: std::env::var("REALITY_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(443),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_endpoint_urls_pass_through_unchanged() {
        let value = "https://core.aeza.net/api".to_string();

        assert_eq!(checked_url(value.clone()).unwrap(), value);
    }

    #[test]
    fn malformed_endpoint_urls_fail_at_startup() {
        let err = checked_url("not a url".to_string()).unwrap_err();

        assert!(matches!(err, AppError::UrlErr(_)));
    }
}
