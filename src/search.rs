//! Lazy, paged search results
//!
use crate::registry::{Error, PackageSummary, Registry, SearchQuery};
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;

struct Cursor {
    registry: Arc<dyn Registry>,
    query: SearchQuery,
    token: Option<String>,
    offset: usize,
    total: Option<usize>,
    buffered: VecDeque<PackageSummary>,
    exhausted: bool,
}

impl Cursor {
    fn is_last_page(&self, received: usize) -> bool {
        received == 0
            || received < self.query.page_size
            || self.total.map_or(false, |total| self.offset >= total)
    }
}

/// Streams every match of `query`. A page is only requested once the previous one is consumed;
/// the first error is yielded and ends the stream.
pub fn paginate(
    registry: Arc<dyn Registry>,
    query: SearchQuery,
    token: Option<String>,
) -> BoxStream<'static, Result<PackageSummary, Error>> {
    let cursor = Cursor {
        registry,
        query,
        token,
        offset: 0,
        total: None,
        buffered: VecDeque::new(),
        exhausted: false,
    };

    stream::try_unfold(cursor, |mut cursor| async move {
        loop {
            if let Some(item) = cursor.buffered.pop_front() {
                return Ok::<_, Error>(Some((item, cursor)));
            }
            if cursor.exhausted {
                return Ok(None);
            }

            let page = cursor
                .registry
                .search_page(&cursor.query, cursor.offset, cursor.token.as_deref())
                .await?;
            let received = page.results.len();
            cursor.offset += received;
            cursor.total = page.total.or(cursor.total);
            cursor.exhausted = cursor.is_last_page(received);
            tracing::debug!(offset = cursor.offset, total = ?cursor.total, "search page received");

            cursor.buffered.extend(page.results);
        }
    })
    .boxed()
}
