//! Anonymous usage statistics.
//!
//! One best-effort JSON POST per export. Failures never reach the caller.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::composer::{PLUGIN_NAME, PLUGIN_VERSION};
use crate::settings::Settings;

const TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
enum TelemetryError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Body of the statistics request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatisticsReport {
    pub plugin: String,
    pub version: String,
    pub id: String,
    pub printer: String,
    pub options: Vec<String>,
    pub os: String,
}

impl StatisticsReport {
    pub fn from_settings(settings: &Settings, id: &str) -> Self {
        Self {
            plugin: PLUGIN_NAME.to_string(),
            version: PLUGIN_VERSION.to_string(),
            id: id.to_string(),
            printer: settings.printer().id().to_string(),
            options: settings
                .corner_options
                .iter()
                .map(|o| o.id().to_string())
                .collect(),
            os: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
        }
    }
}

fn post(url: &str, report: &StatisticsReport) -> Result<(), TelemetryError> {
    let client = reqwest::blocking::Client::builder().timeout(TIMEOUT).build()?;
    client.post(url).json(report).send()?.error_for_status()?;
    Ok(())
}

/// Send statistics if enabled and an endpoint is configured.
///
/// Returns whether the report was delivered. Every failure is logged at
/// debug level and otherwise ignored.
pub fn send_statistics(settings: &Settings) -> bool {
    if !settings.statistics_enabled {
        return false;
    }
    let Some(url) = settings.statistics_url.as_deref() else {
        log::debug!("Statistics enabled without an endpoint, nothing sent");
        return false;
    };
    let id = settings.statistics_id.clone().unwrap_or_default();
    let report = StatisticsReport::from_settings(settings, &id);
    match post(url, &report) {
        Ok(()) => true,
        Err(err) => {
            log::debug!("Sending statistics failed: {}", err);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::CornerOption;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_report_fields() {
        let mut settings = Settings::default();
        settings.corner_options[0] = CornerOption::Nothing;
        let report = StatisticsReport::from_settings(&settings, "abc");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["plugin"], PLUGIN_NAME);
        assert_eq!(json["id"], "abc");
        assert_eq!(json["printer"], "elegoo_neptune_3_pro");
        assert_eq!(
            json["options"],
            serde_json::json!(["nothing", "filament_grams_estimate", "layer_height", "model_height"])
        );
        assert!(json["os"].as_str().unwrap().contains(std::env::consts::OS));
    }

    #[test]
    fn test_disabled_sends_nothing() {
        let settings = Settings {
            statistics_url: Some("http://127.0.0.1:9/".to_string()),
            ..Settings::default()
        };
        assert!(!send_statistics(&settings));
    }

    #[test]
    fn test_unreachable_endpoint_is_swallowed() {
        let settings = Settings {
            statistics_enabled: true,
            statistics_url: Some("http://127.0.0.1:9/stats".to_string()),
            ..Settings::default()
        };
        assert!(!send_statistics(&settings));
    }
}
