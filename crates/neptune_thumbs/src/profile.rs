//! Printer models and the thumbnail family each one's firmware reads.

use std::fmt;
use std::path::PathBuf;

use crate::format::{Rendition, ThumbnailFormat};

/// Firmware families with distinct thumbnail wire formats.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ThumbnailFamily {
    /// Neptune 2 / X generation: raw RGB565 hex rows
    LegacyHex,
    /// Neptune 3 Pro/Plus/Max and Neptune 4 series: ColPic, two sizes
    ElegooPalette,
    /// Sidewinder X3/X4 series: ColPic, three sizes
    ArtilleryPalette,
    /// OrangeStorm Giga: base64 JPEG
    OrangeStormJpeg,
    /// Klipper/Moonraker: base64 PNG blocks
    Klipper,
}

const LEGACY_RENDITIONS: &[Rendition] = &[
    Rendition::new("simage", 100, 100),
    // the second image carries a doubled comment marker
    Rendition::new(";gimage", 200, 200),
];

const ELEGOO_RENDITIONS: &[Rendition] = &[
    Rendition::new("gimage", 200, 200),
    Rendition::new("simage", 160, 160),
];

const ARTILLERY_RENDITIONS: &[Rendition] = &[
    Rendition::new("simage", 85, 85),
    Rendition::new("gimage", 230, 230),
    Rendition::new("mimage", 170, 170),
];

const ORANGESTORM_RENDITIONS: &[Rendition] = &[
    Rendition::new("gimage", 400, 400),
    Rendition::new("simage", 114, 114),
];

const KLIPPER_RENDITIONS: &[Rendition] = &[
    Rendition::new("thumbnail", 32, 32),
    Rendition::new("thumbnail", 300, 300),
];

impl ThumbnailFamily {
    pub fn format(self) -> ThumbnailFormat {
        match self {
            ThumbnailFamily::LegacyHex => ThumbnailFormat::LegacyHex,
            ThumbnailFamily::ElegooPalette | ThumbnailFamily::ArtilleryPalette => {
                ThumbnailFormat::PaletteBinary
            }
            ThumbnailFamily::OrangeStormJpeg => ThumbnailFormat::Base64Jpeg,
            ThumbnailFamily::Klipper => ThumbnailFormat::Base64PngBlock,
        }
    }

    /// Images emitted for this family, in output order.
    pub fn renditions(self) -> &'static [Rendition] {
        match self {
            ThumbnailFamily::LegacyHex => LEGACY_RENDITIONS,
            ThumbnailFamily::ElegooPalette => ELEGOO_RENDITIONS,
            ThumbnailFamily::ArtilleryPalette => ARTILLERY_RENDITIONS,
            ThumbnailFamily::OrangeStormJpeg => ORANGESTORM_RENDITIONS,
            ThumbnailFamily::Klipper => KLIPPER_RENDITIONS,
        }
    }

    /// Default background fill, `None` for transparent.
    pub fn background_color(self) -> Option<[u8; 3]> {
        match self {
            ThumbnailFamily::LegacyHex => Some([30, 36, 52]),
            ThumbnailFamily::ElegooPalette => Some([48, 57, 79]),
            ThumbnailFamily::ArtilleryPalette => Some([46, 54, 75]),
            ThumbnailFamily::OrangeStormJpeg => Some([232, 232, 232]),
            ThumbnailFamily::Klipper => None,
        }
    }

    /// Light backgrounds get dark overlay text.
    pub fn is_light_background(self) -> bool {
        matches!(self, ThumbnailFamily::OrangeStormJpeg)
    }
}

macro_rules! printer_models {
    ($($variant:ident => $id:literal, $name:literal, $family:ident;)*) => {
        /// Supported printers. Unknown ids parse to [`PrinterModel::Unrecognized`].
        #[derive(Clone, Debug, PartialEq, Eq, Hash)]
        pub enum PrinterModel {
            $($variant,)*
            Unrecognized(String),
        }

        impl PrinterModel {
            /// Every recognized model.
            pub const ALL: &'static [PrinterModel] = &[$(PrinterModel::$variant,)*];

            pub fn id(&self) -> &str {
                match self {
                    $(PrinterModel::$variant => $id,)*
                    PrinterModel::Unrecognized(id) => id.as_str(),
                }
            }

            pub fn display_name(&self) -> &str {
                match self {
                    $(PrinterModel::$variant => $name,)*
                    PrinterModel::Unrecognized(id) => id.as_str(),
                }
            }

            pub fn family(&self) -> Option<ThumbnailFamily> {
                match self {
                    $(PrinterModel::$variant => Some(ThumbnailFamily::$family),)*
                    PrinterModel::Unrecognized(_) => None,
                }
            }

            fn from_known_id(id: &str) -> Option<Self> {
                match id {
                    $($id => Some(PrinterModel::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

printer_models! {
    ElegooNeptune2 => "elegoo_neptune_2", "Elegoo Neptune 2", LegacyHex;
    ElegooNeptune2S => "elegoo_neptune_2s", "Elegoo Neptune 2S", LegacyHex;
    ElegooNeptune2D => "elegoo_neptune_2d", "Elegoo Neptune 2D", LegacyHex;
    ElegooNeptuneX => "elegoo_neptune_x", "Elegoo Neptune X", LegacyHex;
    ElegooNeptune3Pro => "elegoo_neptune_3_pro", "Elegoo Neptune 3 Pro", ElegooPalette;
    ElegooNeptune3Plus => "elegoo_neptune_3_plus", "Elegoo Neptune 3 Plus", ElegooPalette;
    ElegooNeptune3Max => "elegoo_neptune_3_max", "Elegoo Neptune 3 Max", ElegooPalette;
    ElegooNeptune4 => "elegoo_neptune_4", "Elegoo Neptune 4", ElegooPalette;
    ElegooNeptune4Pro => "elegoo_neptune_4_pro", "Elegoo Neptune 4 Pro", ElegooPalette;
    ElegooNeptune4Plus => "elegoo_neptune_4_plus", "Elegoo Neptune 4 Plus", ElegooPalette;
    ElegooNeptune4Max => "elegoo_neptune_4_max", "Elegoo Neptune 4 Max", ElegooPalette;
    ElegooOrangeStormGiga => "elegoo_orangestorm_giga", "Elegoo OrangeStorm Giga", OrangeStormJpeg;
    ArtillerySidewinderX3Pro => "artillery_sidewinder_x3_pro", "Artillery Sidewinder X3 Pro", ArtilleryPalette;
    ArtillerySidewinderX3Plus => "artillery_sidewinder_x3_plus", "Artillery Sidewinder X3 Plus", ArtilleryPalette;
    ArtillerySidewinderX4Pro => "artillery_sidewinder_x4_pro", "Artillery Sidewinder X4 Pro", ArtilleryPalette;
    ArtillerySidewinderX4Plus => "artillery_sidewinder_x4_plus", "Artillery Sidewinder X4 Plus", ArtilleryPalette;
    KlipperGeneric => "klipper_generic", "Klipper (generic)", Klipper;
}

impl PrinterModel {
    /// Parse a slicer machine id. Older definitions spell some models
    /// without the separator before the suffix (`elegoo_neptune_3pro`).
    pub fn from_id(id: &str) -> Self {
        let id = id.trim().to_ascii_lowercase();
        if let Some(model) = Self::from_known_id(&id) {
            return model;
        }
        for suffix in ["pro", "plus", "max"] {
            if let Some(base) = id.strip_suffix(suffix) {
                if !base.ends_with('_') {
                    if let Some(model) = Self::from_known_id(&format!("{base}_{suffix}")) {
                        return model;
                    }
                }
            }
        }
        PrinterModel::Unrecognized(id)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, PrinterModel::Unrecognized(_))
    }
}

impl fmt::Display for PrinterModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Background of the 900x900 thumbnail canvas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Background {
    Transparent,
    Solid([u8; 3]),
    /// Image drawn at the top left corner
    Image(PathBuf),
}

/// Everything the composer needs to know about the target device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceProfile {
    pub model: PrinterModel,
    pub family: ThumbnailFamily,
    pub background: Background,
}

impl DeviceProfile {
    /// Profile for `model`, `None` when the model is not recognized.
    pub fn new(model: PrinterModel) -> Option<Self> {
        let family = model.family()?;
        let background = match family.background_color() {
            Some(rgb) => Background::Solid(rgb),
            None => Background::Transparent,
        };
        Some(Self {
            model,
            family,
            background,
        })
    }

    pub fn with_background(mut self, background: Background) -> Self {
        self.background = background;
        self
    }

    pub fn format(&self) -> ThumbnailFormat {
        self.family.format()
    }

    pub fn renditions(&self) -> &'static [Rendition] {
        self.family.renditions()
    }
}
