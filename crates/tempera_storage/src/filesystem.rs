//! Filesystem loader.
//!
//! Reads local files on the tokio blocking pool. When a base directory is
//! configured, locators are resolved relative to it and may not escape it.

use crate::{LoadedMedia, Loader, sniff_mime};
use std::path::{Component, Path, PathBuf};
use tempera_core::{ImageFormat, MediaSource};
use tempera_error::{MediaError, MediaErrorKind};

/// Filesystem loader.
///
/// # Example
///
/// ```rust,no_run
/// use tempera_storage::{FileLoader, Loader};
/// use tempera_core::MediaSource;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let loader = FileLoader::with_base_dir("/var/tempera/assets");
/// let loaded = loader.load(&MediaSource::file("logos/main.png")).await?;
/// println!("{} bytes of {:?}", loaded.bytes.len(), loaded.mime_type);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileLoader {
    base_path: Option<PathBuf>,
}

impl FileLoader {
    /// Loader that accepts absolute or working-directory-relative paths.
    pub fn new() -> Self {
        Self { base_path: None }
    }

    /// Loader confined to `base_path`.
    pub fn with_base_dir(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: Some(base_path.into()),
        }
    }

    /// Resolve a locator to a path, rejecting escapes from the base directory.
    fn resolve(&self, locator: &str) -> Result<PathBuf, MediaError> {
        let requested = Path::new(locator);
        let Some(base) = &self.base_path else {
            return Ok(requested.to_path_buf());
        };

        let escapes = requested.is_absolute()
            || requested
                .components()
                .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
        if escapes {
            return Err(MediaError::new(MediaErrorKind::InvalidLocator(format!(
                "{} escapes base directory {}",
                locator,
                base.display()
            ))));
        }
        Ok(base.join(requested))
    }
}

#[async_trait::async_trait]
impl Loader for FileLoader {
    fn name(&self) -> &str {
        "file"
    }

    #[tracing::instrument(skip(self, source), fields(path = %source.locator()))]
    async fn load(&self, source: &MediaSource) -> Result<LoadedMedia, MediaError> {
        let path = self.resolve(source.locator())?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MediaError::new(MediaErrorKind::NotFound(path.display().to_string()))
            } else {
                MediaError::loader("file", format!("{}: {}", path.display(), e))
            }
        })?;

        let mime_type = sniff_mime(&bytes)
            .map(str::to_string)
            .or_else(|| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .and_then(ImageFormat::from_extension)
                    .map(|format| format.mime_type().to_string())
            });

        tracing::debug!(path = %path.display(), size = bytes.len(), "Read media file");

        let mut loaded = LoadedMedia::new(bytes);
        loaded.mime_type = mime_type;
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            loaded.metadata.insert("filename".to_string(), name.to_string());
        }
        Ok(loaded)
    }
}
