//! Spread layout and book navigation.
//!
//! A storybook is shown the way a printed book is held open: the cover
//! (page 1) stands alone, every following pair of pages forms a two-page
//! spread `(2, 3), (4, 5), (6, 7), ...`, and a document with an even page
//! count ends on a single trailing page that has no partner.
//!
//! All spread and navigation arithmetic lives in this crate. Callers ask
//! for a [`Spread`] (or just the [`pages_shown`]) and for the logical
//! neighbours of a page ([`next_logical_page`], [`prev_logical_page`]);
//! nothing else re-derives page groupings.
//!
//! Page numbers are 1-based throughout.

/// How a spread is physically laid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpreadKind {
    /// Page 1, displayed alone.
    Cover,
    /// The final page of an even-length document, displayed alone.
    TrailingSingle,
    /// Two facing pages, even page on the left.
    Dual,
}

impl std::fmt::Display for SpreadKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SpreadKind::Cover => "cover",
            SpreadKind::TrailingSingle => "trailing-single",
            SpreadKind::Dual => "dual",
        };
        f.write_str(label)
    }
}

/// The set of pages displayed together as one logical screen.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Spread {
    pub kind: SpreadKind,
    /// Ordered page numbers making up this spread (one or two entries).
    ///
    /// For a [`Dual`](SpreadKind::Dual) spread this is always the pair
    /// `(start, start + 1)`, even if `start + 1` lies beyond the document;
    /// use [`pages_shown`] for the pages that actually exist.
    pub pages: Vec<u32>,
}

impl Spread {
    /// First (left-most) page of the spread.
    pub fn start(&self) -> u32 {
        self.pages.first().copied().unwrap_or(1)
    }

    pub fn is_single(&self) -> bool {
        !matches!(self.kind, SpreadKind::Dual)
    }
}

/// Whether `total_pages` leaves a single trailing page at the end.
fn has_trailing_single(total_pages: u32) -> bool {
    total_pages > 0 && total_pages % 2 == 0
}

/// Whether `page` is the single trailing page of an even-length document.
pub fn is_trailing_single(page: u32, total_pages: u32) -> bool {
    has_trailing_single(total_pages) && page == total_pages
}

/// Whether the visible pages are exactly the single trailing page of an
/// even-length document.
pub fn shows_trailing_single(pages_shown: &[u32], total_pages: u32) -> bool {
    matches!(pages_shown, [only] if is_trailing_single(*only, total_pages))
}

/// First page of the dual spread containing `page` (`page >= 2`), or 1 for
/// the cover.
fn spread_start(page: u32) -> u32 {
    if page <= 1 {
        return 1;
    }
    (page - 2) / 2 * 2 + 2
}

/// Computes the spread that contains `page`.
///
/// ```
/// use storybook_layout::{spread_for, SpreadKind};
///
/// assert_eq!(spread_for(1, 8).kind, SpreadKind::Cover);
/// assert_eq!(spread_for(5, 8).pages, vec![4, 5]);
/// assert_eq!(spread_for(8, 8).kind, SpreadKind::TrailingSingle);
/// ```
pub fn spread_for(page: u32, total_pages: u32) -> Spread {
    if page <= 1 {
        return Spread { kind: SpreadKind::Cover, pages: vec![1] };
    }
    if is_trailing_single(page, total_pages) {
        return Spread { kind: SpreadKind::TrailingSingle, pages: vec![page] };
    }
    let start = spread_start(page);
    Spread { kind: SpreadKind::Dual, pages: vec![start, start + 1] }
}

/// The pages actually on screen when `page` is requested: the spread's pages
/// restricted to `[1, total_pages]`.
pub fn pages_shown(page: u32, total_pages: u32) -> Vec<u32> {
    spread_for(page, total_pages).pages.into_iter().filter(|p| (1..=total_pages).contains(p)).collect()
}

/// The page to navigate to when turning forward from `current`.
///
/// Returns `None` when there is nowhere further to go. Turning forward
/// from the last dual spread of an even-length document lands on the
/// trailing single page rather than an invalid spread.
pub fn next_logical_page(current: u32, total_pages: u32) -> Option<u32> {
    if current <= 1 {
        // A one-page document has no page after its cover.
        return (total_pages >= 2).then_some(2);
    }
    if is_trailing_single(current, total_pages) {
        return None;
    }
    let next = spread_start(current) + 2;
    if has_trailing_single(total_pages) && next >= total_pages {
        return Some(total_pages);
    }
    (next <= total_pages).then_some(next)
}

/// The page to navigate to when turning back from `current`.
///
/// Returns `None` on the cover.
pub fn prev_logical_page(current: u32, total_pages: u32) -> Option<u32> {
    match current {
        0 | 1 => None,
        2 | 3 => Some(1),
        _ if is_trailing_single(current, total_pages) => Some(total_pages.saturating_sub(2).max(2)),
        _ => Some(spread_start(current).saturating_sub(2).max(1)),
    }
}

/// Every spread of a document in reading order.
pub fn spreads(total_pages: u32) -> impl Iterator<Item = Spread> {
    let first = (total_pages > 0).then_some(1);
    std::iter::successors(first, move |&page| next_logical_page(page, total_pages))
        .map(move |page| spread_for(page, total_pages))
}
