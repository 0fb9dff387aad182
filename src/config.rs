// Launch configuration read from the environment.
use bevy::prelude::*;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Environment variable holding the launch instant as RFC 3339 text.
pub const LAUNCH_AT_VAR: &str = "BIRTHDAY_LAUNCH_AT";
const DEFAULT_LAUNCH_AT: &str = "2026-01-01T00:00:00Z";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIRTHDAY_LAUNCH_AT is not an RFC 3339 timestamp: {value:?}")]
    InvalidLaunchAt {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Resource, Debug, Clone, PartialEq, Eq)]
pub struct LaunchConfig {
    pub launch_at: DateTime<Utc>,
}

impl Default for LaunchConfig {
    fn default() -> LaunchConfig {
        LaunchConfig {
            launch_at: DateTime::parse_from_rfc3339(DEFAULT_LAUNCH_AT)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(DateTime::UNIX_EPOCH),
        }
    }
}

impl LaunchConfig {
    /// Build from an optional raw value; `None` means the default target.
    pub fn from_value(raw: Option<&str>) -> Result<LaunchConfig, ConfigError> {
        let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
            return Ok(LaunchConfig::default());
        };
        let launch_at = DateTime::parse_from_rfc3339(raw)
            .map_err(|source| ConfigError::InvalidLaunchAt {
                value: raw.to_string(),
                source,
            })?
            .with_timezone(&Utc);
        Ok(LaunchConfig { launch_at })
    }

    /// Runtime environment first (native only), then the value baked in at
    /// compile time.
    pub fn from_env() -> Result<LaunchConfig, ConfigError> {
        #[cfg(not(target_arch = "wasm32"))]
        let runtime = std::env::var(LAUNCH_AT_VAR).ok();
        #[cfg(target_arch = "wasm32")]
        let runtime: Option<String> = None;

        let raw = runtime.or_else(|| option_env!("BIRTHDAY_LAUNCH_AT").map(String::from));
        LaunchConfig::from_value(raw.as_deref())
    }
}

/// Startup system: load the config, falling back to the default on error.
pub fn load_launch_config(mut commands: Commands) {
    let config = match LaunchConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            warn!("{err}; using default launch time");
            LaunchConfig::default()
        }
    };
    info!("Launch target: {}", config.launch_at.to_rfc3339());
    commands.insert_resource(config);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn missing_value_uses_default() {
        assert_eq!(LaunchConfig::from_value(None).unwrap(), LaunchConfig::default());
        assert_eq!(
            LaunchConfig::from_value(Some("  ")).unwrap(),
            LaunchConfig::default()
        );
        assert_eq!(
            LaunchConfig::default().launch_at,
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn offsets_normalise_to_utc() {
        let config = LaunchConfig::from_value(Some("2026-03-14T09:30:00+05:30")).unwrap();
        assert_eq!(
            config.launch_at,
            Utc.with_ymd_and_hms(2026, 3, 14, 4, 0, 0).unwrap()
        );
    }

    #[test]
    fn garbage_is_an_error() {
        let err = LaunchConfig::from_value(Some("next tuesday")).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLaunchAt { ref value, .. } if value == "next tuesday"));
        assert!(err.to_string().contains(LAUNCH_AT_VAR));
    }
}
