//! Reads a project's declared category from its sidecar descriptor.
//!
//! # Examples
//!
//! ```no_run
//! use pkgtidy::metadata::MetadataReader;
//! use std::path::Path;
//!
//! let reader = MetadataReader::default();
//! let resolution = reader.resolve(Path::new("/wallpapers/1234567890"));
//! println!("category: {}", resolution.category);
//! ```

use crate::fsops;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Reserved fallback category.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// The part of the descriptor we care about.
#[derive(Debug, Deserialize)]
struct Descriptor {
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Why a category was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySource {
    /// The descriptor declared a usable type.
    Declared,
    /// No descriptor file in the project.
    MissingDescriptor,
    /// The descriptor has no type, or an empty one.
    EmptyType,
    /// The descriptor could not be read or parsed, or the type is not a
    /// usable directory name.
    Invalid(String),
}

/// The category of one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryResolution {
    pub category: String,
    pub source: CategorySource,
}

impl CategoryResolution {
    fn unknown(source: CategorySource) -> Self {
        Self {
            category: UNKNOWN_CATEGORY.to_string(),
            source,
        }
    }
}

/// Resolves categories from descriptor files.
#[derive(Debug, Clone)]
pub struct MetadataReader {
    descriptor_name: String,
}

impl Default for MetadataReader {
    fn default() -> Self {
        Self::new("project.json")
    }
}

impl MetadataReader {
    pub fn new(descriptor_name: impl Into<String>) -> Self {
        Self {
            descriptor_name: descriptor_name.into(),
        }
    }

    pub fn descriptor_name(&self) -> &str {
        &self.descriptor_name
    }

    /// Returns the category declared by the project in `project_dir`.
    ///
    /// Never fails: a missing, unreadable, or malformed descriptor and an
    /// empty type all resolve to [`UNKNOWN_CATEGORY`].
    pub fn resolve(&self, project_dir: &Path) -> CategoryResolution {
        let descriptor_path = project_dir.join(&self.descriptor_name);
        if !descriptor_path.is_file() {
            return CategoryResolution::unknown(CategorySource::MissingDescriptor);
        }

        let content = match fs::read_to_string(&descriptor_path) {
            Ok(content) => content,
            Err(e) => return CategoryResolution::unknown(CategorySource::Invalid(e.to_string())),
        };

        // Descriptors written on Windows often start with a BOM.
        let content = content.trim_start_matches('\u{feff}');

        let descriptor: Descriptor = match serde_json::from_str(content) {
            Ok(descriptor) => descriptor,
            Err(e) => return CategoryResolution::unknown(CategorySource::Invalid(e.to_string())),
        };

        let declared = descriptor.kind.unwrap_or_default();
        let declared = declared.trim();
        if declared.is_empty() {
            return CategoryResolution::unknown(CategorySource::EmptyType);
        }

        if !fsops::is_plain_name(declared) {
            return CategoryResolution::unknown(CategorySource::Invalid(format!(
                "type '{}' is not a valid directory name",
                declared
            )));
        }

        CategoryResolution {
            category: declared.to_string(),
            source: CategorySource::Declared,
        }
    }

    /// Shorthand for `resolve(project_dir).category`.
    pub fn read_category(&self, project_dir: &Path) -> String {
        self.resolve(project_dir).category
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project_with_descriptor(content: &str) -> TempDir {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("project.json"), content)
            .expect("Failed to write descriptor");
        temp_dir
    }

    #[test]
    fn test_declared_type() {
        let project = project_with_descriptor(r#"{"type": "Scene", "title": "Forest"}"#);
        let resolution = MetadataReader::default().resolve(project.path());

        assert_eq!(resolution.category, "Scene");
        assert_eq!(resolution.source, CategorySource::Declared);
    }

    #[test]
    fn test_type_is_trimmed() {
        let project = project_with_descriptor(r#"{"type": "  Video \n"}"#);
        assert_eq!(MetadataReader::default().read_category(project.path()), "Video");
    }

    #[test]
    fn test_missing_descriptor() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let resolution = MetadataReader::default().resolve(temp_dir.path());

        assert_eq!(resolution.category, UNKNOWN_CATEGORY);
        assert_eq!(resolution.source, CategorySource::MissingDescriptor);
    }

    #[test]
    fn test_empty_and_missing_type() {
        let reader = MetadataReader::default();

        let blank = project_with_descriptor(r#"{"type": "   "}"#);
        assert_eq!(reader.resolve(blank.path()).source, CategorySource::EmptyType);

        let absent = project_with_descriptor(r#"{"title": "No type"}"#);
        assert_eq!(reader.resolve(absent.path()).category, UNKNOWN_CATEGORY);
        assert_eq!(reader.resolve(absent.path()).source, CategorySource::EmptyType);
    }

    #[test]
    fn test_malformed_descriptor() {
        let project = project_with_descriptor("{ not json");
        let resolution = MetadataReader::default().resolve(project.path());

        assert_eq!(resolution.category, UNKNOWN_CATEGORY);
        assert!(matches!(resolution.source, CategorySource::Invalid(_)));
    }

    #[test]
    fn test_non_string_type() {
        let project = project_with_descriptor(r#"{"type": 42}"#);
        let resolution = MetadataReader::default().resolve(project.path());

        assert_eq!(resolution.category, UNKNOWN_CATEGORY);
        assert!(matches!(resolution.source, CategorySource::Invalid(_)));
    }

    #[test]
    fn test_type_with_path_components_is_rejected() {
        let reader = MetadataReader::default();
        for bad in [r#"{"type": "../escape"}"#, r#"{"type": "a/b"}"#, r#"{"type": ".."}"#] {
            let project = project_with_descriptor(bad);
            assert_eq!(reader.read_category(project.path()), UNKNOWN_CATEGORY);
        }
    }

    #[test]
    fn test_bom_is_ignored() {
        let project = project_with_descriptor("\u{feff}{\"type\": \"Web\"}");
        assert_eq!(MetadataReader::default().read_category(project.path()), "Web");
    }

    #[test]
    fn test_custom_descriptor_name() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("meta.json"), r#"{"type": "Application"}"#)
            .expect("Failed to write descriptor");

        let reader = MetadataReader::new("meta.json");
        assert_eq!(reader.read_category(temp_dir.path()), "Application");
        assert_eq!(
            MetadataReader::default().read_category(temp_dir.path()),
            UNKNOWN_CATEGORY
        );
    }
}
