use crate::config::types::{Config, FetcherConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_fetcher_config(&config.fetcher)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates scheduler and fetch limits
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.worker_count < 1 || config.worker_count > 1000 {
        return Err(ConfigError::Validation(format!(
            "worker_count must be between 1 and 1000, got {}",
            config.worker_count
        )));
    }

    if config.max_queued_items == 0 {
        return Err(ConfigError::Validation(
            "max_queued_items must be >= 1".to_string(),
        ));
    }

    if config.max_queue_size == 0 || config.max_queue_size > config.max_queued_items {
        return Err(ConfigError::Validation(format!(
            "max_queue_size must be between 1 and max_queued_items ({}), got {}",
            config.max_queued_items, config.max_queue_size
        )));
    }

    if config.max_urls_per_set == 0 {
        return Err(ConfigError::Validation(
            "max_urls_per_set must be >= 1".to_string(),
        ));
    }

    if config.max_urls_per_server == 0 {
        return Err(ConfigError::Validation(
            "max_urls_per_server must be >= 1".to_string(),
        ));
    }

    if config.threads_per_host == 0 {
        return Err(ConfigError::Validation(
            "threads_per_host must be >= 1".to_string(),
        ));
    }

    if config.min_crawl_delay > config.default_crawl_delay {
        return Err(ConfigError::Validation(format!(
            "min_crawl_delay ({}ms) cannot exceed default_crawl_delay ({}ms)",
            config.min_crawl_delay, config.default_crawl_delay
        )));
    }

    if config.max_content_size == 0 {
        return Err(ConfigError::Validation(
            "max_content_size must be >= 1".to_string(),
        ));
    }

    if config.fetch_window == 0 {
        return Err(ConfigError::Validation(
            "fetch_window must be >= 1ms".to_string(),
        ));
    }

    if config.robots_cache_capacity == 0 {
        return Err(ConfigError::Validation(
            "robots_cache_capacity must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // The crawler name doubles as the robots.txt agent token
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let (local, domain) = email.split_once('@').ok_or_else(|| {
        ConfigError::Validation(format!("Invalid email format: '{}'", email))
    })?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> Config {
        Config {
            fetcher: FetcherConfig::default(),
            user_agent: UserAgentConfig {
                crawler_name: "TestCrawler".to_string(),
                crawler_version: "1.0".to_string(),
                contact_url: "https://example.com/about".to_string(),
                contact_email: "admin@example.com".to_string(),
            },
            output: OutputConfig {
                database_path: "./test.db".to_string(),
            },
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&create_test_config()).is_ok());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let mut config = create_test_config();
        config.fetcher.worker_count = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_queue_larger_than_capacity() {
        let mut config = create_test_config();
        config.fetcher.max_queued_items = 10;
        config.fetcher.max_queue_size = 11;
        assert!(validate(&config).is_err());

        config.fetcher.max_queue_size = 10;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_rejects_zero_batch_and_quota() {
        let mut config = create_test_config();
        config.fetcher.max_urls_per_set = 0;
        assert!(validate(&config).is_err());

        let mut config = create_test_config();
        config.fetcher.max_urls_per_server = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_min_delay_above_default() {
        let mut config = create_test_config();
        config.fetcher.min_crawl_delay = 20_000;
        config.fetcher.default_crawl_delay = 10_000;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_bad_crawler_name() {
        let mut config = create_test_config();
        config.user_agent.crawler_name = "bad name/1.0".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("user@example.com").is_ok());
        assert!(validate_email("admin@sub.example.com").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("invalid").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("user@").is_err());
        assert!(validate_email("user@domain").is_err());
        assert!(validate_email("a@b@example.com").is_err());
    }
}
