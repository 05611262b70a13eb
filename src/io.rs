use image::codecs::bmp::BmpEncoder;
use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageError};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canvas::{Raster, RasterBuffer};
use crate::components::colors::Colour;
use crate::components::legend::{ClassDefinition, ClassKind, Legend};
use crate::session::ClassificationSession;

/// Magic header for session files.
const SESSION_MAGIC_V1: &str = "MLS1";

/// Maximum supported map dimension in pixels (per axis).
/// Prevents memory exhaustion from crafted session files.
const MAX_MAP_DIM: u32 = 32_768;

// ============================================================================
// ERRORS
// ============================================================================

/// Error type for raster and session file operations
#[derive(Debug)]
pub enum MapFileError {
    Io(std::io::Error),
    Image(ImageError),
    Serialize(String),
    InvalidFormat(String),
}

impl fmt::Display for MapFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapFileError::Io(e) => write!(f, "I/O error: {}", e),
            MapFileError::Image(e) => write!(f, "Image error: {}", e),
            MapFileError::Serialize(e) => write!(f, "Serialization error: {}", e),
            MapFileError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
        }
    }
}

impl std::error::Error for MapFileError {}

impl From<std::io::Error> for MapFileError {
    fn from(e: std::io::Error) -> Self {
        MapFileError::Io(e)
    }
}

impl From<ImageError> for MapFileError {
    fn from(e: ImageError) -> Self {
        MapFileError::Image(e)
    }
}

impl From<Box<bincode::ErrorKind>> for MapFileError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        MapFileError::Serialize(e.to_string())
    }
}

#[derive(Debug)]
pub enum LegendError {
    Io(std::io::Error),
    /// 1-based line number.
    Parse { line: usize, message: String },
}

impl fmt::Display for LegendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegendError::Io(e) => write!(f, "I/O error: {}", e),
            LegendError::Parse { line, message } => write!(f, "legend line {}: {}", line, message),
        }
    }
}

impl std::error::Error for LegendError {}

impl From<std::io::Error> for LegendError {
    fn from(e: std::io::Error) -> Self {
        LegendError::Io(e)
    }
}

// ============================================================================
// RASTER FILES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RasterFormat {
    Png,
    Bmp,
}

impl RasterFormat {
    /// Chosen by extension; anything but `.bmp` is written as PNG.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("bmp") => RasterFormat::Bmp,
            _ => RasterFormat::Png,
        }
    }
}

/// Decode any image the `image` crate understands. Alpha is discarded.
pub fn load_raster(path: &Path) -> Result<RasterBuffer, MapFileError> {
    let img = image::open(path)?.to_rgba8();
    let raster = RasterBuffer::from_rgba_image(&img);
    log_info!(
        "Loaded map {} ({}x{})",
        path.display(),
        img.width(),
        img.height()
    );
    Ok(raster)
}

/// Write a raster as opaque PNG or BMP. The path extension is not consulted.
pub fn save_raster(
    raster: &RasterBuffer,
    path: &Path,
    format: RasterFormat,
) -> Result<(), MapFileError> {
    let image = raster.to_rgba_image();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match format {
        RasterFormat::Png => {
            let encoder = PngEncoder::new(&mut writer);
            encoder.write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
        RasterFormat::Bmp => {
            let mut encoder = BmpEncoder::new(&mut writer);
            encoder.encode(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ColorType::Rgba8,
            )?;
        }
    }
    log_info!("Saved map {} as {:?}", path.display(), format);
    Ok(())
}

// ============================================================================
// LEGEND FILES
// ============================================================================
//
//   # comment
//   climate|Hot desert|#ff0000|#fe0101,#fd0000
//   landform|Mountains|#808080|

/// Parse legend text: `kind|name|#primary|#alias,#alias` per line.
pub fn parse_legend(text: &str) -> Result<Legend, LegendError> {
    let mut legend = Legend::new();
    for (i, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let err = |message: String| LegendError::Parse {
            line: i + 1,
            message,
        };

        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        if fields.len() < 3 || fields.len() > 4 {
            return Err(err(format!(
                "expected kind|name|#primary|aliases, found {} field(s)",
                fields.len()
            )));
        }
        let kind = ClassKind::from_name(fields[0])
            .ok_or_else(|| err(format!("unknown class kind '{}'", fields[0])))?;
        let name = fields[1];
        if name.is_empty() {
            return Err(err("class name is empty".to_string()));
        }
        let primary: Colour = fields[2].parse().map_err(|e| err(format!("{}", e)))?;

        let mut secondary = Vec::new();
        if let Some(aliases) = fields.get(3) {
            for alias in aliases.split(',').map(str::trim).filter(|a| !a.is_empty()) {
                secondary.push(alias.parse::<Colour>().map_err(|e| err(format!("{}", e)))?);
            }
        }
        legend.insert(ClassDefinition::new(kind, name, primary).with_secondary(secondary));
    }
    Ok(legend)
}

pub fn load_legend(path: &Path) -> Result<Legend, LegendError> {
    let text = std::fs::read_to_string(path)?;
    let legend = parse_legend(&text)?;
    log_info!("Loaded legend {} ({} classes)", path.display(), legend.len());
    Ok(legend)
}

pub fn legend_to_string(legend: &Legend) -> String {
    let mut out = String::new();
    for class in legend.classes() {
        let aliases: Vec<String> = class.secondary.iter().map(|c| c.to_hex()).collect();
        out.push_str(&format!(
            "{}|{}|{}|{}\n",
            class.kind.name(),
            class.name,
            class.primary.to_hex(),
            aliases.join(",")
        ));
    }
    out
}

pub fn save_legend(legend: &Legend, path: &Path) -> Result<(), LegendError> {
    std::fs::write(path, legend_to_string(legend))?;
    Ok(())
}

// ============================================================================
// SESSION FILES
// ============================================================================

/// V1 serializable session: the working raster and classification choices.
#[derive(Serialize, Deserialize)]
struct SessionFileV1 {
    magic: String,
    name: String,
    width: u32,
    height: u32,
    pixels: Vec<Colour>,
    /// (input, output) for every resolved group.
    assignments: Vec<(Colour, Colour)>,
    highlights: Vec<Colour>,
}

/// Save a session as a `.mls` file. Undo history is not stored.
pub fn save_session(session: &ClassificationSession, path: &Path) -> Result<(), MapFileError> {
    let raster = session.raster();
    let file = SessionFileV1 {
        magic: SESSION_MAGIC_V1.to_string(),
        name: session.name.clone(),
        width: raster.width(),
        height: raster.height(),
        pixels: raster.pixels().to_vec(),
        assignments: session.assignments(),
        highlights: session.highlights().iter().copied().collect(),
    };
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &file)?;
    log_info!("Saved session {}", path.display());
    Ok(())
}

/// Load a `.mls` file against `legend`. The session comes back analyzed,
/// with its saved assignments and highlights.
pub fn load_session(path: &Path, legend: Legend) -> Result<ClassificationSession, MapFileError> {
    let raw = std::fs::read(path)?;
    // bincode writes a String as an 8-byte length prefix + UTF-8 data,
    // so the first field's four magic bytes sit at 8..12.
    let magic = raw
        .get(8..12)
        .and_then(|b| std::str::from_utf8(b).ok())
        .unwrap_or("");
    if magic != SESSION_MAGIC_V1 {
        return Err(MapFileError::InvalidFormat(format!(
            "Unknown magic '{}'",
            magic
        )));
    }

    let file: SessionFileV1 = bincode::deserialize(&raw)?;
    if file.width == 0 || file.height == 0 {
        return Err(MapFileError::InvalidFormat(
            "Map dimensions cannot be zero".into(),
        ));
    }
    if file.width > MAX_MAP_DIM || file.height > MAX_MAP_DIM {
        return Err(MapFileError::InvalidFormat(format!(
            "Map size {}x{} exceeds maximum allowed {}x{}",
            file.width, file.height, MAX_MAP_DIM, MAX_MAP_DIM
        )));
    }
    let raster = RasterBuffer::from_pixels(file.width, file.height, file.pixels).ok_or_else(|| {
        MapFileError::InvalidFormat("Pixel count does not match map dimensions".into())
    })?;

    let mut session =
        ClassificationSession::restore(raster, legend, file.assignments, file.highlights);
    session.name = file.name;
    session.path = Some(path.to_path_buf());
    log_info!("Loaded session {}", path.display());
    Ok(session)
}
