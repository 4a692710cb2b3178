//! Page source over a directory with one file per page

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use walkdir::WalkDir;

use crate::viewer::{PageContent, PageSource, SourceError};

/// Treats every regular file in a directory as a page, in file name order.
///
/// Pages are read whole; image headers are probed for their pixel size.
pub struct DirectorySource {
    root: PathBuf,
    pages: Mutex<Option<Arc<Vec<PathBuf>>>>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            pages: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn pages(&self) -> Result<Arc<Vec<PathBuf>>, SourceError> {
        let mut guard = self
            .pages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(pages) = guard.as_ref() {
            return Ok(Arc::clone(pages));
        }

        let pages = Arc::new(list_pages(&self.root)?);
        *guard = Some(Arc::clone(&pages));
        Ok(pages)
    }
}

fn list_pages(root: &Path) -> Result<Vec<PathBuf>, SourceError> {
    if !root.is_dir() {
        return Err(SourceError::metadata(format!(
            "{} is not a directory",
            root.display()
        )));
    }

    let mut pages = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| SourceError::metadata(e.to_string()))?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if entry.file_type().is_file() && !hidden {
            pages.push(entry.into_path());
        }
    }
    pages.sort();
    Ok(pages)
}

impl PageSource for DirectorySource {
    fn page_count(&self) -> Result<usize, SourceError> {
        let count = self.pages()?.len();
        if count == 0 {
            return Err(SourceError::metadata(format!(
                "no pages in {}",
                self.root.display()
            )));
        }
        Ok(count)
    }

    fn fetch_page(&self, page: usize) -> Result<PageContent, SourceError> {
        let pages = self.pages()?;
        let path = page
            .checked_sub(1)
            .and_then(|index| pages.get(index))
            .ok_or(SourceError::OutOfRange { page })?;

        let data = fs::read(path)?;
        let content = match imagesize::blob_size(&data) {
            Ok(size) => {
                PageContent::new(page, data).with_size(size.width as u32, size.height as u32)
            }
            Err(_) => PageContent::new(page, data),
        };
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_follow_file_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("002.txt"), b"second").unwrap();
        fs::write(dir.path().join("001.txt"), b"first").unwrap();
        fs::write(dir.path().join(".hidden"), b"skip").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let source = DirectorySource::new(dir.path());
        assert_eq!(source.page_count().unwrap(), 2);
        assert_eq!(source.fetch_page(1).unwrap().data, b"first");
        assert_eq!(source.fetch_page(2).unwrap().data, b"second");
        assert!(matches!(
            source.fetch_page(3),
            Err(SourceError::OutOfRange { page: 3 })
        ));
        assert!(matches!(
            source.fetch_page(0),
            Err(SourceError::OutOfRange { page: 0 })
        ));
    }

    #[test]
    fn empty_directory_has_no_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        assert!(matches!(
            source.page_count(),
            Err(SourceError::Metadata { .. })
        ));
    }

    #[test]
    fn missing_directory_is_a_metadata_error() {
        let source = DirectorySource::new("/definitely/not/here");
        assert!(source.page_count().is_err());
    }
}
