//! Extension and hidden-file filtering.

use std::collections::HashSet;
use std::path::Path;

const DEFAULT_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "webp", "bmp", "tif", "tiff", "gif"];

/// Decides which files count as source images
pub struct ImageFilter {
    extensions: HashSet<String>,
    include_hidden: bool,
}

impl ImageFilter {
    pub fn new() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            include_hidden: false,
        }
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Override the accepted extensions (case-insensitive, no dot)
    pub fn with_extensions(mut self, extensions: &[String]) -> Self {
        self.extensions = extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn is_hidden(path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'))
    }

    /// Check if a file should be included
    pub fn should_include(&self, path: &Path) -> bool {
        if !self.include_hidden && Self::is_hidden(path) {
            return false;
        }

        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.contains(&ext.to_lowercase()))
    }
}

impl Default for ImageFilter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_supported_formats() {
        let filter = ImageFilter::new();
        for name in ["a.jpg", "b.JPEG", "c.png", "d.webp", "e.tif", "f.GIF", "g.bmp"] {
            assert!(filter.should_include(Path::new(name)), "{}", name);
        }
    }

    #[test]
    fn excludes_non_images() {
        let filter = ImageFilter::new();
        assert!(!filter.should_include(Path::new("/raw/notes.txt")));
        assert!(!filter.should_include(Path::new("/raw/clip.mp4")));
        assert!(!filter.should_include(Path::new("/raw/no_extension")));
    }

    #[test]
    fn hidden_files_are_opt_in() {
        let path = Path::new("/raw/.thumb.jpg");
        assert!(!ImageFilter::new().should_include(path));
        assert!(ImageFilter::new().with_hidden(true).should_include(path));
    }

    #[test]
    fn custom_extensions_replace_defaults() {
        let filter = ImageFilter::new().with_extensions(&[".PNG".to_string()]);
        assert!(filter.should_include(Path::new("x.png")));
        assert!(!filter.should_include(Path::new("x.jpg")));
    }
}
