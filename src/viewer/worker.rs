//! Fetch worker - runs in separate thread(s)

use std::sync::Arc;

use flume::{Receiver, Sender};

use super::request::{FetchRequest, FetchResponse, RequestId};
use super::source::PageSource;

/// Main worker function - runs in a dedicated thread.
///
/// Pulls requests from the shared queue until it sees `Shutdown` or every
/// sender is gone. The worker never touches the page cache; results travel
/// back over `responses` and are inserted by the session that owns the cache.
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn fetch_worker(
    source: Arc<dyn PageSource>,
    requests: Receiver<FetchRequest>,
    responses: Sender<FetchResponse>,
) {
    for request in requests {
        let response = match request {
            FetchRequest::DocumentInfo { id } => document_info(source.as_ref(), id),
            FetchRequest::Page { id, page, kind } => {
                log::trace!("Fetching page {page} ({kind:?})");
                match source.fetch_page(page) {
                    Ok(data) => FetchResponse::Page {
                        id,
                        page,
                        data: Arc::new(data),
                    },
                    Err(error) => FetchResponse::Error { id, page, error },
                }
            }
            FetchRequest::Shutdown => break,
        };

        // The session is gone; nobody is left to read results
        if responses.send(response).is_err() {
            break;
        }
    }
}

fn document_info(source: &dyn PageSource, id: RequestId) -> FetchResponse {
    match source.page_count() {
        Ok(page_count) => FetchResponse::DocumentInfo { id, page_count },
        Err(error) => FetchResponse::DocumentFailed { id, error },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::request::FetchKind;
    use crate::viewer::source::SourceError;
    use crate::viewer::types::PageContent;

    struct TwoPages;

    impl PageSource for TwoPages {
        fn page_count(&self) -> Result<usize, SourceError> {
            Ok(2)
        }

        fn fetch_page(&self, page: usize) -> Result<PageContent, SourceError> {
            if page > 2 {
                return Err(SourceError::OutOfRange { page });
            }
            Ok(PageContent::new(page, vec![1, 2, 3]))
        }
    }

    #[test]
    fn worker_answers_until_shutdown() {
        let (req_tx, req_rx) = flume::unbounded();
        let (resp_tx, resp_rx) = flume::unbounded();

        req_tx
            .send(FetchRequest::DocumentInfo { id: RequestId::new(1) })
            .unwrap();
        req_tx
            .send(FetchRequest::Page {
                id: RequestId::new(2),
                page: 2,
                kind: FetchKind::Visible,
            })
            .unwrap();
        req_tx
            .send(FetchRequest::Page {
                id: RequestId::new(3),
                page: 7,
                kind: FetchKind::Prefetch,
            })
            .unwrap();
        req_tx.send(FetchRequest::Shutdown).unwrap();

        fetch_worker(Arc::new(TwoPages), req_rx, resp_tx);

        let responses: Vec<_> = resp_rx.drain().collect();
        assert_eq!(responses.len(), 3);
        assert!(matches!(
            responses[0],
            FetchResponse::DocumentInfo { page_count: 2, .. }
        ));
        assert!(matches!(responses[1], FetchResponse::Page { page: 2, .. }));
        assert!(matches!(
            responses[2],
            FetchResponse::Error {
                page: 7,
                error: SourceError::OutOfRange { page: 7 },
                ..
            }
        ));
    }
}
