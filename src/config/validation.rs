use crate::config::types::{
    Config, CrawlerConfig, FieldRule, OutputConfig, SiteConfig, UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use std::collections::HashSet;
use url::Url;

/// Upper bound on the worker pool
const MAX_WORKERS: u32 = 32;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_sites(&config.sites)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 || config.max_workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "max_workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.max_workers
        )));
    }

    if config.attempt_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "attempt_limit must be >= 1, got {}",
            config.attempt_limit
        )));
    }

    if config.seed_attempt_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "seed_attempt_limit must be >= 1, got {}",
            config.seed_attempt_limit
        )));
    }

    if config.fetch_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "fetch_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.run_deadline_secs == Some(0) {
        return Err(ConfigError::Validation(
            "run_deadline_secs must be > 0 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
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
    if config.html_dir.is_empty() {
        return Err(ConfigError::Validation(
            "html_dir cannot be empty".to_string(),
        ));
    }

    if config.csv_dir.is_empty() {
        return Err(ConfigError::Validation("csv_dir cannot be empty".to_string()));
    }

    Ok(())
}

/// Validates every site entry and checks that names are unique
fn validate_sites(sites: &[SiteConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for site in sites {
        validate_site(site)?;

        if !seen.insert(site.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Duplicate site name '{}'",
                site.name
            )));
        }
    }

    Ok(())
}

/// Validates a single site entry
fn validate_site(site: &SiteConfig) -> Result<(), ConfigError> {
    // Site names end up in file names
    if site.name.is_empty()
        || !site
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "Site name must be non-empty and contain only [A-Za-z0-9_-], got '{}'",
            site.name
        )));
    }

    let base = Url::parse(&site.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid base-url '{}': {}", site.base_url, e))
    })?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "base-url '{}' must use HTTP or HTTPS",
            site.base_url
        )));
    }

    if let Some(pattern) = &site.domain {
        validate_domain_pattern(pattern)?;
    }

    if site.seed_name.is_empty() {
        return Err(ConfigError::Validation(format!(
            "seed-name of site '{}' cannot be empty",
            site.name
        )));
    }

    if let Some(ready) = &site.ready_selector {
        check_selector(site, "ready-selector", ready)?;
    }

    check_selector(site, "categories.selector", &site.categories.selector)?;

    if let Some(container) = &site.items.container {
        check_selector(site, "items.container", container)?;
    }
    check_selector(site, "items.selector", &site.items.selector)?;

    let fields = [
        ("items.name", &site.items.name),
        ("items.price", &site.items.price),
        ("items.old-price", &site.items.old_price),
        ("items.id", &site.items.id),
    ];
    for (field, rule) in fields {
        if let Some(rule) = rule {
            check_field_rule(site, field, rule)?;
        }
    }

    if let Some(next) = &site.next_page {
        check_selector(site, "next-page.selector", &next.selector)?;
        if let Some(dismiss) = &next.dismiss {
            check_selector(site, "next-page.dismiss", dismiss)?;
        }
    }

    Ok(())
}

fn check_field_rule(site: &SiteConfig, field: &str, rule: &FieldRule) -> Result<(), ConfigError> {
    if let Some(selector) = &rule.selector {
        check_selector(site, field, selector)?;
    }

    if rule.attr.as_deref() == Some("") {
        return Err(ConfigError::Validation(format!(
            "{}.{}: attr cannot be empty",
            site.name, field
        )));
    }

    Ok(())
}

/// Ensures a CSS selector compiles
fn check_selector(site: &SiteConfig, field: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            site: site.name.clone(),
            field: field.to_string(),
            message: e.to_string(),
        })
}

/// Validates a domain pattern (supports wildcards)
pub(crate) fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    if let Some(domain) = pattern.strip_prefix("*.") {
        validate_domain_string(domain)?;
    } else {
        validate_domain_string(pattern)?;
    }

    Ok(())
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
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

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
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
