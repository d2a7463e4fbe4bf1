use image::{Rgba, RgbaImage};
use neptune_thumbs::*;
use pretty_assertions::assert_eq;

const GCODE: &str = ";FLAVOR:Marlin\n;TIME:3960\n;Filament used: 3.9m\n;Layer height: 0.2\n;MINX:10\n;MAXZ:48\n;Generated with Cura_SteamEngine 5.6.0\nM140 S60\n";
const BODY: &str = ";LAYER:0\nG1 X10 Y10 E1\n";

fn snapshot() -> RgbaImage {
    RgbaImage::from_fn(400, 300, |x, y| {
        let d = (x as i32 - 200).pow(2) + (y as i32 - 150).pow(2);
        if d < 120 * 120 {
            Rgba([(x / 2) as u8, 180, (y / 2) as u8, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

fn settings_for(model: PrinterModel) -> Settings {
    Settings {
        printer_model: model.id().to_string(),
        ..Settings::default()
    }
}

fn control_file() -> ControlFile {
    ControlFile::from_segments(vec![GCODE.to_string(), BODY.to_string()])
}

#[test]
fn test_embed_inserts_head_segment() {
    let settings = settings_for(PrinterModel::ElegooNeptune3Pro);
    let mut file = control_file();
    let meta = file.slice_metadata();
    assert!(embed(&settings, &mut file, &meta, &snapshot()));

    let segments = file.segments();
    assert_eq!(segments.len(), 3);
    assert!(segments[0].starts_with(";gimage:"));
    assert!(segments[0].ends_with(&format!(
        ";Thumbnail generated by the {} plugin version {}\r\r",
        PLUGIN_NAME, PLUGIN_VERSION
    )));
    assert_eq!(segments[1], GCODE);
    assert_eq!(segments[2], BODY);
}

#[test]
fn test_embed_twice_is_idempotent() {
    for model in [
        PrinterModel::ElegooNeptune2,
        PrinterModel::ElegooNeptune4Max,
        PrinterModel::ArtillerySidewinderX3Pro,
        PrinterModel::ElegooOrangeStormGiga,
        PrinterModel::KlipperGeneric,
    ] {
        let settings = Settings {
            klipper_thumbnails_enabled: true,
            ..settings_for(model.clone())
        };
        let meta = control_file().slice_metadata();

        let mut once = control_file();
        embed(&settings, &mut once, &meta, &snapshot());
        let mut twice = once.clone();
        embed(&settings, &mut twice, &meta, &snapshot());
        assert_eq!(once, twice, "{model}");
    }
}

#[test]
fn test_flat_file_reembed() {
    let settings = settings_for(PrinterModel::ElegooNeptune4Pro);
    let flat = format!("{}{}", GCODE, BODY);
    let mut file = ControlFile::parse(&flat);
    let meta = file.slice_metadata();
    embed(&settings, &mut file, &meta, &snapshot());
    let first = file.to_text();

    let mut reparsed = ControlFile::parse(&first);
    assert_eq!(reparsed.segments().len(), 2);
    embed(&settings, &mut reparsed, &meta, &snapshot());
    assert_eq!(reparsed.to_text(), first);
    assert!(first.ends_with(&flat));
}

#[test]
fn test_extracted_sizes_per_family() {
    let cases: [(PrinterModel, &[(&str, u32)]); 4] = [
        (PrinterModel::ElegooNeptune2, &[("simage", 100), ("gimage", 200)]),
        (PrinterModel::ElegooNeptune3Plus, &[("gimage", 200), ("simage", 160)]),
        (
            PrinterModel::ArtillerySidewinderX4Pro,
            &[("simage", 85), ("gimage", 230), ("mimage", 170)],
        ),
        (PrinterModel::ElegooOrangeStormGiga, &[("gimage", 400), ("simage", 114)]),
    ];
    for (model, expected) in cases {
        let settings = settings_for(model.clone());
        let block = compose(&settings, &SliceMetadata::default(), &snapshot()).unwrap();
        let images = ControlFile::parse(&block).embedded_images();
        let found: Vec<(String, u32)> = images
            .iter()
            .map(|image| {
                let img = image.decode().unwrap();
                assert_eq!(img.width(), img.height());
                (image.tag.clone(), img.width())
            })
            .collect();
        let expected: Vec<(String, u32)> = expected.iter().map(|(t, s)| (t.to_string(), *s)).collect();
        assert_eq!(found, expected, "{model}");
    }
}

#[test]
fn test_legacy_scenario() {
    let mut img = RgbaImage::new(2, 1);
    img.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
    img.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
    let text = encode_rendition(
        ThumbnailFormat::LegacyHex,
        &img,
        &Rendition::new("simage", 2, 1),
        ScaleFilter::Nearest,
    );
    assert_eq!(text, ";simage:00f8e007\rM10086 ;\r");
}

#[test]
fn test_palette_payload_decodes_to_sampled_grid() {
    let grid = sample(&snapshot(), 160, 160);
    let encoded = PaletteEncoder::default().encode(&grid, grid.width * grid.height * 10);
    let framed = LineFramer::with_prefix(";simage:").frame(&encoded);
    let images = ControlFile::parse(&framed).embedded_images();
    assert_eq!(images.len(), 1);
    let decoded = decode_colpic(images[0].lines.concat().as_bytes()).unwrap();
    assert_eq!(decoded, grid);
}

#[test]
fn test_corner_time_text() {
    let meta = control_file().slice_metadata();
    assert_eq!(meta.time_seconds, 3960);
    assert_eq!(
        overlay::format_option(CornerOption::TimeEstimate, &meta, "€"),
        "⧖ 1:06h"
    );
}
