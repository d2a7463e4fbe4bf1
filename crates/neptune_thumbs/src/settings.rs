//! User settings, stored as TOML in the user config directory.
//!
//! Loads from `<config_dir>/neptune-thumbs/settings.toml` or a custom path.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::overlay::CornerOption;
use crate::profile::{Background, DeviceProfile, PrinterModel, ThumbnailFamily};
use crate::sampler::ScaleFilter;

/// Errors that can occur when loading or storing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to access settings file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse settings file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Background image overrides per firmware family.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Backgrounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elegoo: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artillery: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orangestorm: Option<PathBuf>,
}

impl Backgrounds {
    pub fn for_family(&self, family: ThumbnailFamily) -> Option<&Path> {
        match family {
            ThumbnailFamily::LegacyHex => self.legacy.as_deref(),
            ThumbnailFamily::ElegooPalette => self.elegoo.as_deref(),
            ThumbnailFamily::ArtilleryPalette => self.artillery.as_deref(),
            ThumbnailFamily::OrangeStormJpeg => self.orangestorm.as_deref(),
            ThumbnailFamily::Klipper => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Slicer machine id of the target printer
    pub printer_model: String,
    /// Top-left, top-right, bottom-left, bottom-right
    pub corner_options: [CornerOption; 4],
    pub thumbnails_enabled: bool,
    pub klipper_thumbnails_enabled: bool,
    pub statistics_enabled: bool,
    /// Render the current model instead of the sample in previews
    pub use_current_model: bool,
    pub currency: String,
    pub scale_filter: ScaleFilter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics_id: Option<String>,
    /// Where statistics are posted. Nothing is sent while unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics_url: Option<String>,
    pub backgrounds: Backgrounds,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            printer_model: PrinterModel::ElegooNeptune3Pro.id().to_string(),
            corner_options: [
                CornerOption::TimeEstimate,
                CornerOption::FilamentGramsEstimate,
                CornerOption::LayerHeight,
                CornerOption::ModelHeight,
            ],
            thumbnails_enabled: true,
            klipper_thumbnails_enabled: false,
            statistics_enabled: false,
            use_current_model: false,
            currency: "€".to_string(),
            scale_filter: ScaleFilter::default(),
            statistics_id: None,
            statistics_url: None,
            backgrounds: Backgrounds::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path` or the default location.
    /// Returns defaults if the file doesn't exist.
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);
        if !path.exists() {
            log::debug!("No settings at {}, using defaults", path.display());
            return Ok(Settings::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| SettingsError::Io {
            path: path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse { path, source })
    }

    /// Write settings to `path` or the default location, creating parent
    /// directories as needed.
    pub fn store(&self, path: Option<&Path>) -> Result<(), SettingsError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);
        let content = self.to_toml()?;
        let io_err = |source| SettingsError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&path, content).map_err(io_err)?;
        log::debug!("Stored settings at {}", path.display());
        Ok(())
    }

    /// Settings as they would be written to disk.
    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// The anonymous installation id, generated on first use.
    pub fn ensure_statistics_id(&mut self) -> &str {
        self.statistics_id.get_or_insert_with(generate_statistics_id)
    }

    pub fn printer(&self) -> PrinterModel {
        PrinterModel::from_id(&self.printer_model)
    }

    /// Device profile for the configured printer, `None` if unrecognized.
    pub fn profile(&self) -> Option<DeviceProfile> {
        let profile = DeviceProfile::new(self.printer())?;
        Some(match self.backgrounds.for_family(profile.family) {
            Some(path) => {
                let path = path.to_path_buf();
                profile.with_background(Background::Image(path))
            }
            None => profile,
        })
    }

    /// Whether anything at all gets embedded.
    pub fn any_thumbnails(&self) -> bool {
        self.thumbnails_enabled || self.klipper_thumbnails_enabled
    }
}

/// Get the default settings file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("neptune-thumbs")
        .join("settings.toml")
}

fn generate_statistics_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(nanos.to_le_bytes());
    hasher.update(std::process::id().to_le_bytes());
    hex::encode(&hasher.finalize()[..16])
}
