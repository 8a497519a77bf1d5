//! Font loading utilities for the lookup_report crate.
//!
//! Both backends measure with the same font files: the raw bytes are loaded once into a
//! [`FontSet`] and handed to `genpdf` for the PDF output and to `rusttype` for the PNG output.

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use genpdf::error::{Error, ErrorKind};
use genpdf::fonts::{FontData, FontFamily};
use log::{debug, warn};

/// Name of the bundled font family.
pub const DEFAULT_FONT_FAMILY_NAME: &str = "Roboto";

/// Environment variable overriding the bundled font directory.
pub const FONTS_DIR_ENV: &str = "LOOKUP_REPORT_FONTS_DIR";

/// Environment variable overriding the Windows fallback font directory.
pub const WINDOWS_FONTS_DIR_ENV: &str = "LOOKUP_REPORT_WINDOWS_FONTS_DIR";

/// File names of the four faces of a family.
struct FaceFiles {
    regular: &'static str,
    bold: &'static str,
    italic: &'static str,
    bold_italic: &'static str,
}

impl FaceFiles {
    fn all(&self) -> [&'static str; 4] {
        [self.regular, self.bold, self.italic, self.bold_italic]
    }
}

const BUNDLED_FONT_FILES: FaceFiles = FaceFiles {
    regular: "Roboto-Regular.ttf",
    bold: "Roboto-Bold.ttf",
    italic: "Roboto-Italic.ttf",
    bold_italic: "Roboto-BoldItalic.ttf",
};

const FALLBACK_FAMILY: &str = "Arial";

const WINDOWS_FONT_FILES: FaceFiles = FaceFiles {
    regular: "arial.ttf",
    bold: "arialbd.ttf",
    italic: "ariali.ttf",
    bold_italic: "arialbi.ttf",
};

/// Raw TrueType data of the report font family.
#[derive(Clone)]
pub struct FontSet {
    pub family_name: String,
    pub regular: Vec<u8>,
    pub bold: Vec<u8>,
    pub italic: Vec<u8>,
    pub bold_italic: Vec<u8>,
}

impl FontSet {
    /// Loads the bundled family, falling back to the Windows Arial family when it is missing.
    pub fn load_default() -> Result<Self, Error> {
        let bundled_err = match locate_bundled_fonts() {
            Ok(directory) => return Self::from_directory(directory),
            Err(err) => err,
        };
        if !is_not_found(&bundled_err) {
            return Err(bundled_err);
        }

        let fallback = system_font_directory()
            .ok_or_else(|| not_found("no system font directory to fall back to"))
            .and_then(|directory| read_family(&directory, &WINDOWS_FONT_FILES, FALLBACK_FAMILY));
        match fallback {
            Ok(set) => {
                warn!(
                    "{}; using the {} family instead",
                    bundled_err, FALLBACK_FAMILY
                );
                Ok(set)
            }
            Err(fallback_err) => {
                warn!("{}; {} fallback failed: {}", bundled_err, FALLBACK_FAMILY, fallback_err);
                Err(Error::new(
                    format!("No usable report fonts: {} ({})", bundled_err, fallback_err),
                    io::Error::new(io::ErrorKind::NotFound, "report fonts not found"),
                ))
            }
        }
    }

    /// Loads the four faces from `directory` using the bundled file names.
    pub fn from_directory(directory: impl AsRef<Path>) -> Result<Self, Error> {
        read_family(directory.as_ref(), &BUNDLED_FONT_FILES, DEFAULT_FONT_FAMILY_NAME)
    }

    /// Converts the raw data into a `genpdf` font family.
    pub fn to_genpdf_family(&self) -> Result<FontFamily<FontData>, Error> {
        let face = |bytes: &Vec<u8>, style: &str| {
            FontData::new(bytes.clone(), None).map_err(|err| {
                Error::new(
                    format!("Failed to parse {} {} font: {}", self.family_name, style, err),
                    io::Error::new(io::ErrorKind::InvalidData, err.to_string()),
                )
            })
        };

        Ok(FontFamily {
            regular: face(&self.regular, "regular")?,
            bold: face(&self.bold, "bold")?,
            italic: face(&self.italic, "italic")?,
            bold_italic: face(&self.bold_italic, "bold italic")?,
        })
    }
}

/// Directory holding the fonts shipped with the crate sources.
pub fn bundled_fonts_source_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets/fonts")
}

/// Directories searched for the bundled family, most specific first.
fn search_path() -> Vec<PathBuf> {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("assets/fonts")));

    let mut dirs: Vec<PathBuf> = Vec::with_capacity(3);
    for dir in [non_empty_env_path(FONTS_DIR_ENV), exe_dir, Some(bundled_fonts_source_dir())]
        .into_iter()
        .flatten()
    {
        if !dirs.contains(&dir) {
            dirs.push(dir);
        }
    }
    dirs
}

/// Why `dir` cannot serve the bundled family, if it cannot.
fn unusable_reason(dir: &Path, files: &FaceFiles) -> Option<String> {
    if !dir.is_dir() {
        return Some("no such directory".to_owned());
    }
    let missing: Vec<&str> = files
        .all()
        .into_iter()
        .filter(|name| !dir.join(name).is_file())
        .collect();
    (!missing.is_empty()).then(|| format!("lacks {}", missing.join(", ")))
}

fn locate_bundled_fonts() -> Result<PathBuf, Error> {
    let mut rejected = Vec::new();
    for dir in search_path() {
        match unusable_reason(&dir, &BUNDLED_FONT_FILES) {
            None => return Ok(dir),
            Some(reason) => rejected.push(format!("{}: {}", dir.display(), reason)),
        }
    }

    Err(not_found(format!(
        "{} fonts not found (searched {}); copy them into assets/fonts or set {}",
        DEFAULT_FONT_FAMILY_NAME,
        rejected.join("; "),
        FONTS_DIR_ENV
    )))
}

fn read_face(directory: &Path, file: &str, family: &str, style: &str) -> Result<Vec<u8>, Error> {
    let path = directory.join(file);
    std::fs::read(&path).map_err(|err| {
        Error::new(
            format!("Failed to load {} {} font at {}: {}", family, style, path.display(), err),
            err,
        )
    })
}

fn read_family(directory: &Path, files: &FaceFiles, family: &str) -> Result<FontSet, Error> {
    debug!("loading {} font family from {}", family, directory.display());
    Ok(FontSet {
        family_name: family.to_owned(),
        regular: read_face(directory, files.regular, family, "regular")?,
        bold: read_face(directory, files.bold, family, "bold")?,
        italic: read_face(directory, files.italic, family, "italic")?,
        bold_italic: read_face(directory, files.bold_italic, family, "bold italic")?,
    })
}

fn non_empty_env_path(var: &str) -> Option<PathBuf> {
    env::var_os(var)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

fn system_font_directory() -> Option<PathBuf> {
    if let Some(dir) = non_empty_env_path(WINDOWS_FONTS_DIR_ENV) {
        return Some(dir);
    }
    if cfg!(windows) {
        return ["WINDIR", "SystemRoot"]
            .into_iter()
            .filter_map(non_empty_env_path)
            .map(|root| root.join("Fonts"))
            .find(|dir| dir.is_dir());
    }
    None
}

fn not_found(message: impl Into<String>) -> Error {
    let message = message.into();
    Error::new(
        message.clone(),
        io::Error::new(io::ErrorKind::NotFound, message),
    )
}

fn is_not_found(err: &Error) -> bool {
    match err.kind() {
        ErrorKind::IoError(io_err) => matches!(
            io_err.kind(),
            io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
        ),
        _ => false,
    }
}

/// Indicates whether the bundled font family is present on disk.
pub fn default_fonts_available() -> bool {
    locate_bundled_fonts().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_reports_not_found() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = FontSet::from_directory(dir.path()).err().expect("no fonts in empty dir");
        assert!(is_not_found(&err));
        assert!(err.to_string().contains("Roboto regular"));
    }

    #[test]
    fn invalid_font_data_is_rejected_by_genpdf() {
        let set = FontSet {
            family_name: "Broken".into(),
            regular: b"not a font".to_vec(),
            bold: Vec::new(),
            italic: Vec::new(),
            bold_italic: Vec::new(),
        };
        let err = set.to_genpdf_family().err().expect("garbage is not a font");
        assert!(err.to_string().contains("Broken regular"));
    }
}
