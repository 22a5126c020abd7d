mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = [
        "./config.toml",
        "./fetcharr.toml",
        "~/.config/fetcharr/config.toml",
        "/etc/fetcharr/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.downloads.max_concurrent == 0 {
        anyhow::bail!("downloads.max_concurrent cannot be 0");
    }

    config
        .service
        .check_schedule
        .parse::<cron::Schedule>()
        .with_context(|| {
            format!(
                "Invalid cron expression in service.check_schedule: {:?}",
                config.service.check_schedule
            )
        })?;

    for show in &config.shows {
        if show.name.is_empty() {
            anyhow::bail!("A show is missing a name");
        }
        if show.catalog_url.is_empty() {
            anyhow::bail!("Show '{}' has no catalog_url", show.name);
        }
        if show.metadata_url.is_none() {
            tracing::warn!(
                "Show '{}' has no metadata_url; episodes will not be enriched",
                show.name
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut config = Config::default();
        config.downloads.max_concurrent = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_bad_cron_expression() {
        let mut config = Config::default();
        config.service.check_schedule = "not a schedule".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn parses_full_config() {
        let toml_src = r#"
            [service]
            check_schedule = "0 0 */4 * * *"
            port = 8085

            [downloads]
            output_dir = "/srv/media"
            max_concurrent = 3
            max_retries = 2
            retry_delay_secs = 60
            naming = "air_date"

            [[shows]]
            name = "Document 72 Hours"
            catalog_url = "https://catalog.example/shows/document72hours"
            metadata_url = "https://metadata.example/series/document-72-hours"

            [[shows]]
            id = "journeys"
            name = "Journeys in Japan"
            catalog_url = "https://catalog.example/shows/journeys"
        "#;

        let config: Config = toml::from_str(toml_src).unwrap();
        validate_config(&config).unwrap();

        assert_eq!(config.downloads.max_concurrent, 3);
        assert_eq!(config.shows.len(), 2);
        assert_eq!(config.shows[0].show_id(), "document-72-hours");
        assert_eq!(config.shows[1].show_id(), "journeys");
    }
}
