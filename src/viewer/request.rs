//! Fetch request and response types exchanged with the worker pool

use std::sync::Arc;

use super::source::SourceError;
use super::types::PageContent;

/// Unique identifier for fetch requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Why a page is being fetched
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchKind {
    /// Page belongs to the spread on screen
    Visible,
    /// Page warmed ahead of navigation
    Prefetch,
}

/// Request sent to fetch workers
#[derive(Debug)]
pub enum FetchRequest {
    /// Ask the source for its page count
    DocumentInfo { id: RequestId },

    /// Fetch and decode a page
    Page {
        id: RequestId,
        page: usize,
        kind: FetchKind,
    },

    /// Shutdown the worker
    Shutdown,
}

/// Response from fetch workers
#[derive(Debug)]
pub enum FetchResponse {
    /// Document metadata
    DocumentInfo { id: RequestId, page_count: usize },

    /// The source could not establish the page count
    DocumentFailed { id: RequestId, error: SourceError },

    /// Decoded page
    Page {
        id: RequestId,
        page: usize,
        data: Arc<PageContent>,
    },

    /// Page could not be produced
    Error {
        id: RequestId,
        page: usize,
        error: SourceError,
    },
}

impl FetchResponse {
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            FetchResponse::DocumentInfo { id, .. }
            | FetchResponse::DocumentFailed { id, .. }
            | FetchResponse::Page { id, .. }
            | FetchResponse::Error { id, .. } => *id,
        }
    }
}
