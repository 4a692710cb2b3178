// Export modules for use in tests
pub mod clock;
pub mod debounce;
pub mod dir_source;
pub mod panic_handler;
pub mod positions;
pub mod settings;
pub mod viewer;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the viewer entry points
pub use viewer::{
    DocumentSession, LayoutSpec, NavState, PageContent, PageSource, SourceError, SpreadMode,
    Viewer, ViewerOptions, ViewerState,
};
