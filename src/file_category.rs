//! Extension based file classification.
//!
//! This module maps filenames to destination categories using a table of
//! known extensions. Keys are stored uppercase and may be compound
//! (`TAR.GZ`, `PKG.TAR.XZ`); lookups prefer the longest known suffix.
//!
//! # Examples
//!
//! ```
//! use cleanup::file_category::ExtensionTable;
//!
//! let table = ExtensionTable::default();
//! assert_eq!(table.classify("report.pdf"), Some("Documents"));
//! assert_eq!(table.classify("backup.tar.gz"), Some("Archives"));
//! assert_eq!(table.classify("notes.gz"), Some("Compressed"));
//! assert_eq!(table.classify("README"), None);
//! ```

use std::collections::HashMap;

/// Built-in destination categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// Multi-file archives (ZIP, TAR, TAR.GZ, 7Z, etc.)
    Archive,
    /// Audio files (MP3, WAV, FLAC, etc.)
    Audio,
    /// Source code and markup (RS, PY, JS, HTML, etc.)
    Code,
    /// Single-stream compressed files (GZ, BZ2, XZ, ZST)
    Compressed,
    /// Disk images (ISO, DMG, IMG)
    DiskImage,
    /// Document files (PDF, DOCX, TXT, etc.)
    Document,
    /// Executables and libraries (EXE, MSI, DLL, etc.)
    Executable,
    /// Font files (TTF, OTF, WOFF, etc.)
    Font,
    /// Image files (PNG, JPG, GIF, etc.)
    Image,
    /// Installable packages (DEB, RPM, PKG.TAR.XZ, etc.)
    Package,
    /// Presentation files (PPTX, ODP, etc.)
    Presentation,
    /// Spreadsheet and tabular data (XLSX, CSV, ODS, etc.)
    Spreadsheet,
    /// Video files (MP4, MKV, AVI, etc.)
    Video,
}

impl Category {
    /// Returns the directory name files of this category are moved into.
    ///
    /// # Examples
    ///
    /// ```
    /// use cleanup::file_category::Category;
    ///
    /// assert_eq!(Category::Image.dir_name(), "Images");
    /// assert_eq!(Category::Document.dir_name(), "Documents");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Archive => "Archives",
            Category::Audio => "Audio",
            Category::Code => "Code",
            Category::Compressed => "Compressed",
            Category::DiskImage => "Disk Images",
            Category::Document => "Documents",
            Category::Executable => "Executables",
            Category::Font => "Fonts",
            Category::Image => "Images",
            Category::Package => "Packages",
            Category::Presentation => "Presentations",
            Category::Spreadsheet => "Spreadsheets",
            Category::Video => "Videos",
        }
    }

    fn extensions(&self) -> &'static [&'static str] {
        match self {
            Category::Archive => &[
                "ZIP", "RAR", "7Z", "TAR", "TGZ", "TAR.GZ", "TAR.BZ2", "TAR.XZ", "TAR.ZST",
            ],
            Category::Audio => &["MP3", "WAV", "OGG", "FLAC", "AAC", "M4A", "WMA", "OPUS"],
            Category::Code => &[
                "RS", "PY", "JS", "TS", "JAVA", "C", "CPP", "H", "HPP", "GO", "RB", "SH", "CSS",
                "HTML", "HTM", "JSON", "XML", "YAML", "YML", "TOML",
            ],
            Category::Compressed => &["GZ", "BZ2", "XZ", "ZST", "LZ"],
            Category::DiskImage => &["ISO", "DMG", "IMG"],
            Category::Document => &[
                "PDF", "TXT", "DOC", "DOCX", "ODT", "RTF", "MD", "TEX", "EPUB",
            ],
            Category::Executable => &["EXE", "MSI", "DLL", "BIN", "APP", "APPIMAGE"],
            Category::Font => &["TTF", "OTF", "WOFF", "WOFF2"],
            Category::Image => &[
                "PNG", "JPG", "JPEG", "GIF", "BMP", "SVG", "WEBP", "TIFF", "ICO", "HEIC",
            ],
            Category::Package => &["DEB", "RPM", "APK", "PKG.TAR.XZ", "PKG.TAR.ZST"],
            Category::Presentation => &["PPT", "PPTX", "ODP", "KEY"],
            Category::Spreadsheet => &["XLS", "XLSX", "ODS", "CSV", "TSV"],
            Category::Video => &["MP4", "MKV", "AVI", "MOV", "FLV", "WMV", "WEBM", "3GP"],
        }
    }

    const ALL: [Category; 13] = [
        Category::Archive,
        Category::Audio,
        Category::Code,
        Category::Compressed,
        Category::DiskImage,
        Category::Document,
        Category::Executable,
        Category::Font,
        Category::Image,
        Category::Package,
        Category::Presentation,
        Category::Spreadsheet,
        Category::Video,
    ];
}

/// Lookup table from extension keys to category names.
#[derive(Debug, Clone)]
pub struct ExtensionTable {
    extension_map: HashMap<String, String>,
}

impl ExtensionTable {
    /// Creates an empty table with no known extensions.
    pub fn empty() -> Self {
        Self {
            extension_map: HashMap::new(),
        }
    }

    /// Creates a table populated with the built-in categories.
    pub fn new() -> Self {
        let mut table = Self::empty();
        for category in Category::ALL {
            for ext in category.extensions() {
                table.add_mapping(ext, category.dir_name());
            }
        }
        table
    }

    /// Adds or replaces a mapping. `ext` may be compound (`"tar.gz"`) and
    /// may carry a leading dot.
    pub fn add_mapping(&mut self, ext: &str, category: &str) {
        let key = ext.trim_start_matches('.').to_uppercase();
        self.extension_map.insert(key, category.to_string());
    }

    /// Looks up a single extension key, case-insensitively.
    pub fn get(&self, ext: &str) -> Option<&str> {
        self.extension_map
            .get(&ext.to_uppercase())
            .map(String::as_str)
    }

    /// Returns the longest known extension key of `filename`, uppercased.
    ///
    /// Triple suffixes are only tried when the name has at least four
    /// dot-separated segments, double suffixes with at least three, so a
    /// bare `tar.gz` is treated as stem `tar` plus extension `GZ`.
    pub fn longest_extension(&self, filename: &str) -> Option<String> {
        let parts: Vec<&str> = filename.split('.').collect();

        for width in [3usize, 2, 1] {
            if parts.len() > width {
                let key = parts[parts.len() - width..].join(".").to_uppercase();
                if self.extension_map.contains_key(&key) {
                    return Some(key);
                }
            }
        }

        None
    }

    /// Classifies a filename, returning its category or `None` when the
    /// name carries no known extension.
    pub fn classify(&self, filename: &str) -> Option<&str> {
        self.longest_extension(filename)
            .and_then(|key| self.extension_map.get(&key))
            .map(String::as_str)
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        Self::new()
    }
}
