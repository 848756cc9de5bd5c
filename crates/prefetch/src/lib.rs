//! Bounded prefetch caches.
//!
//! Navigation feels instant when the pages (and narration) around the
//! reader's position have already been resolved. This crate provides the
//! store those speculative results land in, [`PrefetchCache`], and the
//! page prefetcher that fills it, [`prefetch_around`].
//!
//! Eviction is by **insertion order**: once the bound is exceeded the entry
//! inserted earliest is dropped, regardless of how recently it was read.
//! Reads never promote an entry.

mod cache;

pub use crate::cache::{PrefetchCache, SharedCache};
use storybook_provider::{PageHandle, PageProvider};
use tracing::instrument;

/// Page numbers within `distance` of `center`, nearest first, forwards
/// before backwards, restricted to `[1, total_pages]`.
pub fn neighbours(center: u32, total_pages: u32, distance: u32) -> Vec<u32> {
    let mut pages = Vec::with_capacity(distance as usize * 2);
    for d in 1..=distance {
        for page in [center.checked_add(d), center.checked_sub(d)].into_iter().flatten() {
            if (1..=total_pages).contains(&page) && !pages.contains(&page) {
                pages.push(page);
            }
        }
    }
    pages
}

/// Resolve the pages around `center` that are not cached yet and insert them.
///
/// Best-effort: a page that fails to resolve is logged and skipped. Returns
/// the number of pages inserted.
#[instrument(skip_all, fields(center = center, distance = distance))]
pub async fn prefetch_around(
    provider: &dyn PageProvider,
    cache: &SharedCache<u32, PageHandle>,
    center: u32,
    total_pages: u32,
    distance: u32,
) -> usize {
    let mut inserted = 0;
    for page in neighbours(center, total_pages, distance) {
        if cache.has(&page) {
            continue;
        }
        match provider.get_page(page).await {
            Ok(handle) => {
                if let Some(evicted) = cache.insert(page, handle) {
                    tracing::trace!(page, evicted, "Evicted prefetched page");
                }
                inserted += 1;
            },
            Err(err) => tracing::debug!(page, error = ?err, "Prefetch page failed"),
        }
    }
    tracing::debug!(inserted, cached = cache.len(), "Prefetch complete");
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use storybook_provider::mock::{MockDocument, Stage};

    #[rstest]
    #[case(5, 10, 2, vec![6, 4, 7, 3])]
    #[case(1, 10, 2, vec![2, 3])]
    #[case(10, 10, 2, vec![9, 8])]
    #[case(2, 3, 3, vec![3, 1])]
    #[case(1, 1, 2, vec![])]
    fn test_neighbours(#[case] center: u32, #[case] total: u32, #[case] distance: u32, #[case] expected: Vec<u32>) {
        assert_eq!(neighbours(center, total, distance), expected);
    }

    #[tokio::test]
    async fn test_prefetch_around_fills_cache() {
        let doc = MockDocument::new(10);
        let cache = SharedCache::new(6);
        assert_eq!(prefetch_around(&doc, &cache, 5, 10, 2).await, 4);
        assert_eq!(cache.keys(), vec![6, 4, 7, 3]);
        assert_eq!(cache.get(&7).map(|page| page.number()), Some(7));
    }

    #[tokio::test]
    async fn test_prefetch_around_skips_cached() {
        let doc = MockDocument::new(10);
        let cache = SharedCache::new(6);
        prefetch_around(&doc, &cache, 5, 10, 2).await;
        // Moving one page forward only needs the two new neighbours.
        assert_eq!(prefetch_around(&doc, &cache, 6, 10, 2).await, 2);
        assert_eq!(doc.resolved().await, vec![6, 4, 7, 3, 5, 8]);
    }

    #[tokio::test]
    async fn test_prefetch_around_ignores_failures() {
        let doc = MockDocument::new(10);
        doc.fail(Stage::Resolve, 4).await;
        let cache = SharedCache::new(6);
        assert_eq!(prefetch_around(&doc, &cache, 5, 10, 1).await, 1);
        assert!(cache.has(&6));
        assert!(!cache.has(&4));
    }

    #[tokio::test]
    async fn test_prefetch_around_respects_bound() {
        let doc = MockDocument::new(20);
        let cache = SharedCache::new(3);
        prefetch_around(&doc, &cache, 10, 20, 2).await;
        // 11, 9, 12, 8 inserted in that order; 11 evicted first.
        assert_eq!(cache.keys(), vec![9, 12, 8]);
    }
}
