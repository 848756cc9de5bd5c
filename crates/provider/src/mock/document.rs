//! In-memory page provider for testing.

use crate::error::{ErrorKind, Result};
use crate::page::{PageHandle, PageProvider, Surface};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use tokio::sync::{RwLock, watch};

/// The asynchronous step of the page pipeline a gate or failure applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// [`PageProvider::get_page`]
    Resolve,
    /// [`PageProvider::render`]
    Paint,
}

/// A completed paint, as recorded by [`MockDocument`].
#[derive(Clone, Debug, PartialEq)]
pub struct Paint {
    pub page: u32,
    pub surface: Surface,
    pub scale: f32,
}

struct Gate {
    open: watch::Sender<bool>,
    parked: watch::Sender<bool>,
}

#[derive(Default)]
struct State {
    gates: HashMap<(Stage, u32), Gate>,
    failures: HashSet<(Stage, u32)>,
    resolved: Vec<u32>,
    painted: Vec<Paint>,
}

/// In-memory page provider for testing.
///
/// Every page is a blank 600×800 sheet. Calls can be parked behind a gate
/// per `(Stage, page)`, which makes overlapping renders reproducible:
///
/// ```
/// use storybook_provider::mock::{MockDocument, Stage};
/// use storybook_provider::PageProvider;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let doc = Arc::new(MockDocument::new(8));
/// doc.hold(Stage::Resolve, 2).await;
///
/// let pending = tokio::spawn({
///     let doc = Arc::clone(&doc);
///     async move { doc.get_page(2).await.map(|page| page.number()) }
/// });
/// doc.reached(Stage::Resolve, 2).await;
/// assert!(doc.resolved().await.is_empty());
///
/// doc.release(Stage::Resolve, 2).await;
/// assert_eq!(pending.await.unwrap().unwrap(), 2);
/// # }
/// ```
pub struct MockDocument {
    total_pages: u32,
    available: bool,
    state: RwLock<State>,
}

impl MockDocument {
    pub const PAGE_WIDTH: f32 = 600.0;
    pub const PAGE_HEIGHT: f32 = 800.0;

    pub fn new(total_pages: u32) -> Self {
        Self { total_pages, available: true, state: RwLock::new(State::default()) }
    }

    /// A document that fails to open.
    pub fn unavailable() -> Self {
        Self { available: false, ..Self::new(0) }
    }

    /// Park the next call for `page` at `stage` until [`release`](Self::release).
    pub async fn hold(&self, stage: Stage, page: u32) {
        let gate = Gate { open: watch::channel(false).0, parked: watch::channel(false).0 };
        self.state.write().await.gates.insert((stage, page), gate);
    }

    /// Wait until a call for `page` is parked at `stage`.
    ///
    /// Returns immediately when no gate is installed.
    pub async fn reached(&self, stage: Stage, page: u32) {
        let parked = self.state.read().await.gates.get(&(stage, page)).map(|gate| gate.parked.subscribe());
        if let Some(mut parked) = parked {
            _ = parked.wait_for(|parked| *parked).await;
        }
    }

    /// Let parked (and future) calls for `page` at `stage` proceed.
    pub async fn release(&self, stage: Stage, page: u32) {
        if let Some(gate) = self.state.write().await.gates.remove(&(stage, page)) {
            gate.open.send_replace(true);
        }
    }

    /// Make every call for `page` at `stage` fail.
    pub async fn fail(&self, stage: Stage, page: u32) {
        self.state.write().await.failures.insert((stage, page));
    }

    /// Page numbers resolved so far, in completion order.
    pub async fn resolved(&self) -> Vec<u32> {
        self.state.read().await.resolved.clone()
    }

    /// Paints completed so far, in completion order.
    pub async fn painted(&self) -> Vec<Paint> {
        self.state.read().await.painted.clone()
    }

    async fn pass(&self, stage: Stage, page: u32) -> bool {
        // Don't hold the state lock while parked.
        let open = self.state.read().await.gates.get(&(stage, page)).map(|gate| {
            gate.parked.send_replace(true);
            gate.open.subscribe()
        });
        if let Some(mut open) = open {
            _ = open.wait_for(|open| *open).await;
        }
        !self.state.read().await.failures.contains(&(stage, page))
    }
}

#[async_trait]
impl PageProvider for MockDocument {
    async fn open(&self, source: &str) -> Result<u32> {
        if !self.available {
            exn::bail!(ErrorKind::Load(format!("cannot open {source}")));
        }
        Ok(self.total_pages)
    }

    async fn get_page(&self, number: u32) -> Result<PageHandle> {
        let passed = self.pass(Stage::Resolve, number).await;
        if number == 0 || number > self.total_pages {
            exn::bail!(ErrorKind::NotFound(number));
        }
        if !passed {
            exn::bail!(ErrorKind::Load(format!("page {number} is corrupt")));
        }
        self.state.write().await.resolved.push(number);
        Ok(PageHandle::new(number, Self::PAGE_WIDTH, Self::PAGE_HEIGHT, ()))
    }

    async fn render(&self, page: &PageHandle, scale: f32, target: Surface) -> Result<()> {
        if !self.pass(Stage::Paint, page.number()).await {
            exn::bail!(ErrorKind::Render(format!("page {} failed to paint", page.number())));
        }
        self.state.write().await.painted.push(Paint { page: page.number(), surface: target, scale });
        Ok(())
    }
}
