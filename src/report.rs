//! Plain-text views of layout, narration and session data.

use crate::error::{ErrorKind, Result};
use std::fmt;
use std::time::Duration;
use storybook_config::{AudioMap, BookConfig};
use storybook_engine::{SessionState, preload_source, select_clip};
use storybook_layout::{next_logical_page, pages_shown, prev_logical_page, spreads};
use time::UtcDateTime;

fn check_document(total_pages: u32) -> Result<()> {
    if total_pages == 0 {
        exn::bail!(ErrorKind::InvalidArgument("a document needs at least one page".to_string()));
    }
    Ok(())
}

fn check_page(page: u32, total_pages: u32) -> Result<()> {
    check_document(total_pages)?;
    if page == 0 || page > total_pages {
        exn::bail!(ErrorKind::InvalidArgument(format!("page {page} is outside 1..={total_pages}")));
    }
    Ok(())
}

fn join_pages(pages: &[u32]) -> String {
    pages.iter().map(u32::to_string).collect::<Vec<_>>().join("-")
}

fn or_none(page: Option<u32>) -> String {
    page.map_or_else(|| "none".to_string(), |page| page.to_string())
}

/// One line per spread: its kind followed by its pages.
pub fn spread_lines(total_pages: u32) -> Result<Vec<String>> {
    check_document(total_pages)?;
    let lines = spreads(total_pages)
        .map(|spread| format!("{:<16} {}", spread.kind.to_string(), join_pages(&spread.pages)))
        .collect();
    Ok(lines)
}

#[derive(Debug, PartialEq, Eq)]
pub struct Navigation {
    pub shown: Vec<u32>,
    pub next: Option<u32>,
    pub prev: Option<u32>,
}

impl Navigation {
    pub fn at(page: u32, total_pages: u32) -> Result<Self> {
        check_page(page, total_pages)?;
        Ok(Self {
            shown: pages_shown(page, total_pages),
            next: next_logical_page(page, total_pages),
            prev: prev_logical_page(page, total_pages),
        })
    }
}

impl fmt::Display for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "shown: {}", join_pages(&self.shown))?;
        writeln!(f, "next:  {}", or_none(self.next))?;
        write!(f, "prev:  {}", or_none(self.prev))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct Narration {
    pub shown: Vec<u32>,
    pub clip: Option<String>,
    /// The next view and the clip that would be preloaded for it.
    pub preload: Option<(u32, String)>,
}

impl Narration {
    pub fn at(page: u32, total_pages: u32, book: &BookConfig, audio_map: Option<&AudioMap>) -> Result<Self> {
        check_page(page, total_pages)?;
        let shown = pages_shown(page, total_pages);
        let clip = select_clip(&shown, total_pages, audio_map).map(str::to_string);
        let preload = next_logical_page(page, total_pages).and_then(|next| {
            preload_source(next, total_pages, book, audio_map).map(|source| (next, source.to_string()))
        });
        Ok(Self { shown, clip, preload })
    }
}

impl fmt::Display for Narration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "shown:   {}", join_pages(&self.shown))?;
        writeln!(f, "clip:    {}", self.clip.as_deref().unwrap_or("none"))?;
        match &self.preload {
            Some((page, source)) => write!(f, "preload: {source} (page {page})"),
            None => write!(f, "preload: none"),
        }
    }
}

/// Describe a saved session and, given a page count, whether it would be restored.
pub fn describe_session(
    state: Option<&SessionState>,
    total_pages: Option<u32>,
    max_age: Duration,
    now: UtcDateTime,
) -> String {
    let Some(state) = state else {
        return "no saved session".to_string();
    };
    let mut lines = vec![
        format!("page:   {}", state.current_page),
        format!("muted:  {}", state.muted),
        format!("scale:  {}", state.scale),
    ];
    match state.captured_at() {
        Some(at) => lines.push(format!("age:    {}", now - at)),
        None => lines.push(format!("age:    unknown (timestamp {})", state.timestamp)),
    }
    if let Some(total_pages) = total_pages {
        let verdict = match state.validate(total_pages, max_age, now) {
            Ok(()) => "would be restored".to_string(),
            Err(err) => format!("would be discarded ({err})"),
        };
        lines.push(format!("status: {verdict}"));
    }
    lines.join("\n")
}
