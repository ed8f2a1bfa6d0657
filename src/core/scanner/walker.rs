//! Directory walking implementation using walkdir.

use super::{filter::ImageFilter, relative_name, DiscoveryResult, ImageFormat, ImageScanner, SourceImage};
use crate::error::ScanError;
use crate::events::{Event, EventSender, ScanEvent};
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Configuration for the directory walk
#[derive(Debug, Clone, Default)]
pub struct WalkConfig {
    /// Whether to follow symbolic links
    pub follow_symlinks: bool,
    /// Whether to include hidden files and directories
    pub include_hidden: bool,
    /// Maximum directory depth (None = unlimited)
    pub max_depth: Option<usize>,
    /// Custom extensions to include (None = use defaults)
    pub extensions: Option<Vec<String>>,
}

impl From<&crate::config::ScanConfig> for WalkConfig {
    fn from(config: &crate::config::ScanConfig) -> Self {
        Self {
            follow_symlinks: config.follow_symlinks,
            include_hidden: config.include_hidden,
            max_depth: config.max_depth,
            extensions: config.extensions.clone(),
        }
    }
}

/// Scanner implementation using the walkdir crate
pub struct WalkDirScanner {
    config: WalkConfig,
    filter: ImageFilter,
}

impl WalkDirScanner {
    pub fn new(config: WalkConfig) -> Self {
        let mut filter = ImageFilter::new().with_hidden(config.include_hidden);
        if let Some(ref extensions) = config.extensions {
            filter = filter.with_extensions(extensions);
        }
        Self { config, filter }
    }
}

impl ImageScanner for WalkDirScanner {
    fn discover(&self, root: &Path) -> Result<DiscoveryResult, ScanError> {
        self.discover_with_events(root, &crate::events::null_sender())
    }

    fn discover_with_events(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> Result<DiscoveryResult, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut walker = WalkDir::new(root).follow_links(self.config.follow_symlinks);
        if let Some(depth) = self.config.max_depth {
            walker = walker.max_depth(depth);
        }

        let include_hidden = self.config.include_hidden;
        let mut result = DiscoveryResult::default();

        // The root itself may be hidden (temp dirs often are)
        let entries = walker
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || include_hidden || !ImageFilter::is_hidden(e.path()));

        for entry in entries {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if !path.is_file() || !self.filter.should_include(path) {
                        continue;
                    }

                    let size = match entry.metadata() {
                        Ok(metadata) => metadata.len(),
                        Err(e) => {
                            warn!("Cannot stat {}: {}", path.display(), e);
                            0
                        }
                    };

                    result.images.push(SourceImage {
                        path: path.to_path_buf(),
                        name: relative_name(root, path),
                        size,
                        format: ImageFormat::from_path(path),
                    });
                }
                Err(e) => {
                    let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();
                    let error = if e.io_error().map(|e| e.kind())
                        == Some(std::io::ErrorKind::PermissionDenied)
                    {
                        ScanError::PermissionDenied { path: path.clone() }
                    } else {
                        ScanError::ReadDirectory {
                            path: path.clone(),
                            source: std::io::Error::other(e.to_string()),
                        }
                    };

                    warn!("{}", error);
                    events.send(Event::Scan(ScanEvent::ItemFailed {
                        path,
                        message: error.to_string(),
                    }));
                    result.errors.push(error);
                }
            }
        }

        result.images.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(
            "Discovered {} images under {}",
            result.images.len(),
            root.display()
        );
        events.send(Event::Scan(ScanEvent::Discovered {
            total: result.images.len(),
        }));

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let mut file = File::create(&path).unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        path
    }

    fn scanner() -> WalkDirScanner {
        WalkDirScanner::new(WalkConfig::default())
    }

    #[test]
    fn empty_directory_finds_nothing() {
        let dir = TempDir::new().unwrap();
        let result = scanner().discover(dir.path()).unwrap();
        assert!(result.images.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn nested_images_get_relative_names() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "root.jpg");
        touch(dir.path(), "people/portrait.png");
        touch(dir.path(), "notes.txt");

        let result = scanner().discover(dir.path()).unwrap();
        let names: Vec<_> = result.images.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["people/portrait.png", "root.jpg"]);
        assert_eq!(result.images[0].format, ImageFormat::Png);
    }

    #[test]
    fn hidden_directories_are_skipped_by_default() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "visible.jpg");
        touch(dir.path(), ".cache/thumb.jpg");
        touch(dir.path(), ".hidden.jpg");

        let result = scanner().discover(dir.path()).unwrap();
        assert_eq!(result.images.len(), 1);

        let all = WalkDirScanner::new(WalkConfig {
            include_hidden: true,
            ..Default::default()
        })
        .discover(dir.path())
        .unwrap();
        assert_eq!(all.images.len(), 3);
    }

    #[test]
    fn max_depth_limits_walk() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "deep/b.jpg");

        let shallow = WalkDirScanner::new(WalkConfig {
            max_depth: Some(1),
            ..Default::default()
        });
        assert_eq!(shallow.discover(dir.path()).unwrap().images.len(), 1);
    }

    #[test]
    fn missing_root_is_fatal() {
        let result = scanner().discover(Path::new("/nonexistent/path/12345"));
        assert!(matches!(result, Err(ScanError::DirectoryNotFound { .. })));
    }
}
