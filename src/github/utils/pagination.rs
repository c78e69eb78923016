//! The paginated qualifying fetch loop.
//!
//! A [`PageSource`] hands out one page of candidates per call; [`collect_qualified`] walks those pages,
//! keeps the candidates its predicate accepts (in discovery order) and stops as soon as the target is met,
//! the source runs dry, the page limit is hit or a fetch fails. Whatever was gathered up to that point is
//! returned: deciding whether a short collection is acceptable belongs to the caller.

use async_trait::async_trait;
use log::{debug, trace, warn};
use strum_macros::Display;

use crate::config::Pagination;
use crate::github::json::page::Connection;
use crate::repominer_error::MineError;

/// One page of candidates plus what is needed to ask for the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub end_cursor: Option<String>,
    pub has_next_page: bool,
}

impl<T> From<Connection<T>> for Page<T> {
    /// `null` nodes are dropped; they cannot be evaluated.
    fn from(connection: Connection<T>) -> Self {
        Page {
            items: connection.nodes.into_iter().flatten().collect(),
            end_cursor: connection.page_info.end_cursor,
            has_next_page: connection.page_info.has_next_page,
        }
    }
}

/// A remote, cursor-paginated listing.
#[async_trait]
pub trait PageSource: Sync {
    type Item: Send;

    /// Human-readable name of the listing, for logs.
    fn describe(&self) -> String;

    /// Fetches the page following `cursor` (the first page when `None`).
    async fn fetch_page(&self, cursor: Option<&str>, per_page: u32) -> Result<Page<Self::Item>, MineError>;
}

/// Why a qualification loop stopped.
#[derive(Display, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Termination {
    TargetReached,
    Exhausted,
    PageLimitReached,
    FetchFailed,
}

/// Outcome of a qualification loop.
#[derive(Debug)]
pub struct Collected<T> {
    /// Qualified candidates in discovery order; never longer than the target.
    pub items: Vec<T>,
    /// Pages successfully fetched.
    pub pages: u32,
    pub termination: Termination,
    /// The failure behind [`Termination::FetchFailed`].
    pub error: Option<MineError>,
}

impl<T> Collected<T> {
    fn new(items: Vec<T>, pages: u32, termination: Termination) -> Self {
        Collected {
            items,
            pages,
            termination,
            error: None,
        }
    }

    pub fn reached_target(&self) -> bool {
        self.termination == Termination::TargetReached
    }

    /// Accept-partial policy: keep whatever was qualified, however the loop ended.
    pub fn into_partial(self) -> Vec<T> {
        self.items
    }
}

/// Walks `source` page by page and keeps the candidates `predicate` accepts, until `pagination.target` of
/// them have been found or the listing cannot go any further.
///
/// Every candidate is evaluated at most once, pages are requested strictly in order and the loop never
/// evaluates the remainder of a page once the target is met. The configured pause is only slept between
/// two fetches.
pub async fn collect_qualified<S, P>(
    source: &S, pagination: &Pagination, mut predicate: P,
) -> Collected<S::Item>
where
    S: PageSource,
    P: FnMut(&S::Item) -> bool,
{
    let mut qualified: Vec<S::Item> = Vec::new();

    if pagination.target == 0 {
        debug!("Nothing to collect from [{}]; target is 0.", source.describe());
        return Collected::new(qualified, 0, Termination::TargetReached);
    }

    let mut cursor: Option<String> = None;
    let mut pages: u32 = 0;

    loop {
        trace!("Fetching page {} of [{}] (cursor = {:?})...", pages + 1, source.describe(), cursor);

        let page = match source.fetch_page(cursor.as_deref(), pagination.per_page).await {
            Ok(page) => page,
            Err(e) => {
                warn!(
                    "Fetching page {} of [{}] failed; keeping the {} item(s) qualified so far. Error = {}",
                    pages + 1,
                    source.describe(),
                    qualified.len(),
                    e
                );
                let mut collected = Collected::new(qualified, pages, Termination::FetchFailed);
                collected.error = Some(e);
                return collected;
            }
        };
        pages += 1;

        let Page {
            items,
            end_cursor,
            has_next_page,
        } = page;

        for candidate in items {
            if predicate(&candidate) {
                qualified.push(candidate);

                if qualified.len() >= pagination.target {
                    debug!(
                        "Target of {} reached for [{}] after {} page(s).",
                        pagination.target,
                        source.describe(),
                        pages
                    );
                    return Collected::new(qualified, pages, Termination::TargetReached);
                }
            }
        }

        trace!("[{}] has {} qualified item(s) after page {}.", source.describe(), qualified.len(), pages);

        let next_cursor = match (has_next_page, end_cursor) {
            (true, Some(next_cursor)) => next_cursor,
            (true, None) => {
                warn!("[{}] claims more pages but sent no cursor; stopping.", source.describe());
                return Collected::new(qualified, pages, Termination::Exhausted);
            }
            (false, _) => return Collected::new(qualified, pages, Termination::Exhausted),
        };

        if pagination.max_pages.map_or(false, |max_pages| pages >= max_pages) {
            debug!("Page limit of [{}] reached with {} item(s).", source.describe(), qualified.len());
            return Collected::new(qualified, pages, Termination::PageLimitReached);
        }

        cursor = Some(next_cursor);

        if !pagination.page_pause.is_zero() {
            tokio::time::sleep(pagination.page_pause).await;
        }
    }
}
