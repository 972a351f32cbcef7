//! Cursor-driven accumulation of paged results under a deadline.

use std::{fmt::Display, future::Future};

use scout_model::Cursor;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Items requested when the caller asks for `0`.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// One page from a paged source.
///
/// An empty `next_cursor` means the source has no more data.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Cursor,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_cursor: Cursor) -> Self {
        Self { items, next_cursor }
    }

    /// Final page: no cursor to continue from.
    pub fn last(items: Vec<T>) -> Self {
        Self::new(items, Cursor::default())
    }
}

/// Fetch pages until `target` items are gathered, the data runs out, or
/// `deadline` passes.
///
/// `fetch_page` receives the number of items still wanted and the cursor to
/// continue from. At least one page is always fetched; the deadline is
/// checked between pages only. The result may overshoot `target` since pages
/// are never truncated.
///
/// A fetch error is returned only when nothing was gathered yet. Otherwise
/// the partial result is returned with the last good cursor so the caller
/// can resume.
pub async fn accumulate<T, E, F, Fut>(
    target: usize,
    cursor: Cursor,
    deadline: Instant,
    mut fetch_page: F,
) -> Result<Page<T>, E>
where
    F: FnMut(usize, Cursor) -> Fut,
    Fut: Future<Output = Result<Page<T>, E>>,
    E: Display,
{
    let target = if target == 0 { DEFAULT_BATCH_SIZE } else { target };
    let mut items: Vec<T> = Vec::new();
    let mut cursor = cursor;
    let mut pages = 0usize;

    loop {
        let wanted = target.saturating_sub(items.len());
        match fetch_page(wanted, cursor.clone()).await {
            Ok(page) => {
                pages += 1;
                items.extend(page.items);
                let next = page.next_cursor;
                if next.is_empty() || next == cursor {
                    // end of data, or a source that stopped advancing
                    cursor = Cursor::default();
                    break;
                }
                cursor = next;
            }
            Err(err) if items.is_empty() => return Err(err),
            Err(err) => {
                warn!(error = %err, collected = items.len(), "page fetch failed; keeping partial results");
                break;
            }
        }

        if items.len() >= target {
            break;
        }
        if Instant::now() >= deadline {
            debug!(collected = items.len(), target, "deadline reached while paging");
            break;
        }
    }

    debug!(pages, collected = items.len(), more = !cursor.is_empty(), "accumulation finished");
    Ok(Page {
        items,
        next_cursor: cursor,
    })
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use super::*;

    fn far() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    /// Source yielding `page` items per call with an advancing offset cursor.
    fn counting_source(
        page: usize,
        calls: Arc<AtomicUsize>,
    ) -> impl FnMut(usize, Cursor) -> std::future::Ready<Result<Page<u64>, String>> {
        move |_wanted, cursor| {
            calls.fetch_add(1, Ordering::SeqCst);
            let start = cursor.offset();
            let items = (start..start + page as u64).collect();
            std::future::ready(Ok(Page::new(items, Cursor::from_offset(start + page as u64))))
        }
    }

    #[tokio::test]
    async fn stops_once_target_is_reached_without_truncating() {
        let calls = Arc::new(AtomicUsize::new(0));
        let page = accumulate(25, Cursor::start(), far(), counting_source(10, calls.clone()))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(page.items.len(), 30);
        assert_eq!(page.next_cursor.offset(), 30);
    }

    #[tokio::test]
    async fn zero_target_means_one_default_batch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let page = accumulate(0, Cursor::start(), far(), counting_source(40, calls.clone()))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(page.items.len(), 120);
    }

    #[tokio::test]
    async fn partial_results_survive_a_later_error() {
        let mut call = 0;
        let page = accumulate(50, Cursor::start(), far(), |_, _| {
            call += 1;
            std::future::ready(if call == 1 {
                Ok(Page::new(vec![1, 2, 3, 4, 5], Cursor::from_offset(5)))
            } else {
                Err("rate limited".to_string())
            })
        })
        .await
        .unwrap();

        assert_eq!(page.items, vec![1, 2, 3, 4, 5]);
        assert_eq!(page.next_cursor.offset(), 5);
    }

    #[tokio::test]
    async fn first_error_is_propagated() {
        let res: Result<Page<u8>, String> = accumulate(10, Cursor::start(), far(), |_, _| {
            std::future::ready(Err("boom".to_string()))
        })
        .await;
        assert_eq!(res.unwrap_err(), "boom");
    }

    #[tokio::test]
    async fn empty_cursor_ends_paging() {
        let mut calls = 0;
        let page = accumulate(100, Cursor::start(), far(), |_, _| {
            calls += 1;
            std::future::ready(Ok::<_, String>(Page::last(vec![1, 2])))
        })
        .await
        .unwrap();

        assert_eq!(calls, 1);
        assert!(page.next_cursor.is_empty());
    }

    #[tokio::test]
    async fn stuck_cursor_is_end_of_data() {
        let mut calls = 0;
        let start = Cursor::from_offset(7);
        let page = accumulate(100, start.clone(), far(), |_, cursor: Cursor| {
            calls += 1;
            std::future::ready(Ok::<_, String>(Page::new(vec![1], cursor)))
        })
        .await
        .unwrap();

        assert_eq!(calls, 1);
        assert_eq!(page.items, vec![1]);
        assert!(page.next_cursor.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_checked_between_pages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let deadline = Instant::now() + Duration::from_secs(15);
        let counter = calls.clone();

        let page = accumulate(1000, Cursor::start(), deadline, move |_, cursor: Cursor| {
            let n = counter.fetch_add(1, Ordering::SeqCst) as u64;
            async move {
                tokio::time::sleep(Duration::from_secs(10)).await;
                let next = Cursor::from_offset(cursor.offset() + 10);
                Ok::<_, String>(Page::new(vec![n; 10], next))
            }
        })
        .await
        .unwrap();

        // second page finishes past the deadline but is kept
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(page.items.len(), 20);
        assert_eq!(page.next_cursor.offset(), 20);
    }
}
