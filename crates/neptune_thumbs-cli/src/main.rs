//! neptune-thumbs - Embed printer display thumbnails into G-code
//!
//! A command-line tool for adding, previewing and extracting the thumbnails
//! shown by Elegoo, Artillery and Klipper printer displays.

use clap::{Parser, Subcommand};
use neptune_thumbs::{
    embed, render_preview, send_statistics, ControlFile, CornerOption, PrinterModel, Settings,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "neptune-thumbs")]
#[command(version)]
#[command(about = "Embed printer display thumbnails into G-code", long_about = None)]
struct Cli {
    /// Settings file (default: <config dir>/neptune-thumbs/settings.toml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace the thumbnails of a G-code file
    Embed {
        /// Input G-code file
        input: PathBuf,

        /// Model snapshot (PNG or JPEG)
        #[arg(short, long)]
        image: PathBuf,

        /// Output G-code file (default: overwrite input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Printer model id, overrides the settings
        #[arg(short, long)]
        printer: Option<String>,

        /// Filament weight in grams
        #[arg(long, default_value = "0")]
        filament_grams: f64,

        /// Filament cost
        #[arg(long, default_value = "0")]
        filament_cost: f64,

        /// Extrusion line width in mm
        #[arg(long, default_value = "0.4")]
        line_width: f64,
    },

    /// Render the 900x900 thumbnail with sample statistics to PNG
    Preview {
        /// Output PNG file
        #[arg(short, long, default_value = "thumbnail_preview.png")]
        output: PathBuf,

        /// Model snapshot drawn as the foreground
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Printer model id, overrides the settings
        #[arg(short, long)]
        printer: Option<String>,
    },

    /// Extract the thumbnails of a G-code file to PNG files
    Inspect {
        /// Input G-code file
        input: PathBuf,

        /// Directory for the extracted images
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// List supported printer models
    Models,

    /// Show or change settings
    Config {
        /// Printer model id
        #[arg(long)]
        printer: Option<String>,

        /// Corner options, comma separated (top-left,top-right,bottom-left,bottom-right)
        #[arg(long, value_delimiter = ',')]
        corners: Option<Vec<String>>,

        /// Embed firmware thumbnails
        #[arg(long)]
        thumbnails: Option<bool>,

        /// Embed additional Klipper thumbnails
        #[arg(long)]
        klipper: Option<bool>,

        /// Send anonymous statistics
        #[arg(long)]
        statistics: Option<bool>,

        /// Require the current model in previews
        #[arg(long)]
        use_current_model: Option<bool>,

        /// Currency symbol for the cost estimate
        #[arg(long)]
        currency: Option<String>,
    },
}

fn load_image(path: &Path) -> Result<image::RgbaImage, Box<dyn std::error::Error>> {
    let img = image::open(path).map_err(|e| format!("Failed to open '{}': {}", path.display(), e))?;
    Ok(img.to_rgba8())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();
    let settings_path = cli.settings.as_deref();
    let mut settings = Settings::load(settings_path)?;

    match cli.command {
        Commands::Embed {
            input,
            image,
            output,
            printer,
            filament_grams,
            filament_cost,
            line_width,
        } => {
            if let Some(printer) = printer {
                settings.printer_model = printer;
            }
            if settings.statistics_enabled {
                if settings.statistics_id.is_none() {
                    settings.ensure_statistics_id();
                    settings.store(settings_path)?;
                }
                send_statistics(&settings);
            }

            let text = fs::read_to_string(&input)
                .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;
            let snapshot = load_image(&image)?;
            let mut file = ControlFile::parse(&text);
            let mut meta = file.slice_metadata();
            meta.filament_grams = filament_grams;
            meta.filament_cost = filament_cost;
            meta.line_width = line_width;

            log::info!(
                "Embedding '{}' for {} into '{}'",
                image.display(),
                settings.printer(),
                input.display()
            );
            if !embed(&settings, &mut file, &meta, &snapshot) {
                log::warn!("No thumbnail generated, '{}' left unchanged", input.display());
                return Ok(());
            }

            let out_path = output.unwrap_or(input);
            let text = file.to_text();
            fs::write(&out_path, &text)?;
            log::info!("Written {} bytes to '{}'", text.len(), out_path.display());
        }

        Commands::Preview {
            output,
            image,
            printer,
        } => {
            if let Some(printer) = printer {
                settings.printer_model = printer;
            }
            let profile = settings
                .profile()
                .ok_or_else(|| format!("Unrecognized printer '{}'", settings.printer_model))?;
            if settings.use_current_model && image.is_none() {
                return Err("use_current_model is set, pass the model snapshot with --image".into());
            }
            let snapshot = image.as_deref().map(load_image).transpose()?;
            let preview = render_preview(&settings, &profile, snapshot.as_ref());
            preview.save(&output)?;
            log::info!("Preview for {} -> '{}'", profile.model, output.display());
        }

        Commands::Inspect { input, out_dir } => {
            let text = fs::read_to_string(&input)
                .map_err(|e| format!("Failed to read '{}': {}", input.display(), e))?;
            let images = ControlFile::parse(&text).embedded_images();
            if images.is_empty() {
                log::info!("No thumbnails in '{}'", input.display());
                return Ok(());
            }
            fs::create_dir_all(&out_dir)?;
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "thumbnail".to_string());
            for (i, embedded) in images.iter().enumerate() {
                match embedded.decode() {
                    Ok(img) => {
                        let path = out_dir.join(format!("{}_{}_{}.png", stem, i, embedded.tag));
                        img.save(&path)?;
                        println!(
                            "{} {}x{} -> {}",
                            embedded.tag,
                            img.width(),
                            img.height(),
                            path.display()
                        );
                    }
                    Err(err) => log::warn!("Cannot decode {} #{}: {}", embedded.tag, i, err),
                }
            }
        }

        Commands::Models => {
            for model in PrinterModel::ALL {
                if let Some(family) = model.family() {
                    println!("{:<32} {:<32} {:?}", model.id(), model.display_name(), family);
                }
            }
        }

        Commands::Config {
            printer,
            corners,
            thumbnails,
            klipper,
            statistics,
            use_current_model,
            currency,
        } => {
            let mut changed = false;
            if let Some(printer) = printer {
                if !PrinterModel::from_id(&printer).is_recognized() {
                    log::warn!("'{}' is not a supported printer", printer);
                }
                settings.printer_model = printer;
                changed = true;
            }
            if let Some(corners) = corners {
                if corners.len() != 4 {
                    return Err(format!("Expected 4 corner options, got {}", corners.len()).into());
                }
                for (slot, id) in settings.corner_options.iter_mut().zip(&corners) {
                    *slot = CornerOption::from_id(id.trim())
                        .ok_or_else(|| format!("Unknown corner option '{}'", id))?;
                }
                changed = true;
            }
            for (value, field) in [
                (thumbnails, &mut settings.thumbnails_enabled),
                (klipper, &mut settings.klipper_thumbnails_enabled),
                (statistics, &mut settings.statistics_enabled),
                (use_current_model, &mut settings.use_current_model),
            ] {
                if let Some(value) = value {
                    *field = value;
                    changed = true;
                }
            }
            if let Some(currency) = currency {
                settings.currency = currency;
                changed = true;
            }
            if changed {
                settings.store(settings_path)?;
                log::info!("Settings updated");
            }
            print!("{}", settings.to_toml()?);
        }
    }

    Ok(())
}
