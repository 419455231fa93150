use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use image::DynamicImage;
use tracing::debug;

use crate::engine::OcrError;

/// Memoizing decode cache keyed by file path.
///
/// The same page image is revisited once per extracted field, so decoding
/// is paid once per file. No eviction: a run processes a small, bounded
/// batch of receipts. Constructed once per run and passed by reference to
/// every component that crops regions — there are no process-wide caches.
#[derive(Default)]
pub struct ImageCache {
    entries: Mutex<HashMap<PathBuf, Arc<DynamicImage>>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoded image for `path`, loading it on first use.
    pub fn load(&self, path: &Path) -> Result<Arc<DynamicImage>, OcrError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(image) = entries.get(path) {
            return Ok(Arc::clone(image));
        }

        debug!(path = %path.display(), "decoding page image");
        let image = image::open(path).map_err(|e| OcrError::ImageDecode(e.to_string()))?;
        let image = Arc::new(image);
        entries.insert(path.to_path_buf(), Arc::clone(&image));
        Ok(image)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        DynamicImage::ImageRgb8(RgbImage::new(6, 6)).save(&path).unwrap();
        path
    }

    #[test]
    fn second_load_hits_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "page.png");

        let cache = ImageCache::new();
        let a = cache.load(&path).unwrap();
        // Delete the backing file: a cached decode must still be served.
        std::fs::remove_file(&path).unwrap();
        let b = cache.load(&path).unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn distinct_paths_get_distinct_entries() {
        let dir = tempfile::tempdir().unwrap();
        let p1 = write_png(dir.path(), "a.png");
        let p2 = write_png(dir.path(), "b.png");

        let cache = ImageCache::new();
        cache.load(&p1).unwrap();
        cache.load(&p2).unwrap();
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn missing_file_is_a_decode_error() {
        let cache = ImageCache::new();
        let err = cache.load(Path::new("/nonexistent/receipt.png")).unwrap_err();
        assert!(matches!(err, OcrError::ImageDecode(_)));
        assert!(cache.is_empty());
    }
}
