//! Page source capability
//!
//! The viewer core never decodes documents itself. Whoever embeds it supplies
//! a [`PageSource`] that knows how to count and produce decoded pages; the
//! calls run on worker threads so they are free to block.

use super::types::PageContent;

/// Errors reported by a page source
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("page {page} is outside the document")]
    OutOfRange { page: usize },

    #[error("document metadata unavailable: {detail}")]
    Metadata { detail: String },

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("{detail}")]
    Generic { detail: String },
}

impl SourceError {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }

    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata { detail: msg.into() }
    }
}

/// Asynchronous producer of decoded pages.
///
/// Implementations are shared between worker threads, hence `Send + Sync`.
pub trait PageSource: Send + Sync {
    /// Total number of pages. May be slow (waits for document metadata).
    fn page_count(&self) -> Result<usize, SourceError>;

    /// Produce the decoded content of a 1-indexed page.
    fn fetch_page(&self, page: usize) -> Result<PageContent, SourceError>;
}
