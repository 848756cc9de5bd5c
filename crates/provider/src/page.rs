//! Document page provider interface.

use crate::error::Result;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Output surface a page is painted onto.
///
/// Single-page views (the cover and a trailing single page) use
/// [`Single`](Self::Single); two-page spreads paint their even page on
/// [`Left`](Self::Left) and the odd page on [`Right`](Self::Right).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Surface {
    Single,
    Left,
    Right,
}

/// A resolved page, owned by the provider that produced it.
///
/// The orchestrator only ever clones and hands handles back to the same
/// provider; it never inspects the provider-specific payload. Providers get
/// their payload back with [`downcast_ref`](Self::downcast_ref).
#[derive(Clone)]
pub struct PageHandle {
    number: u32,
    width: f32,
    height: f32,
    inner: Arc<dyn Any + Send + Sync>,
}

impl PageHandle {
    /// Wraps a provider-specific page object.
    ///
    /// `width`/`height` are the page dimensions at scale 1.0.
    pub fn new(number: u32, width: f32, height: f32, inner: impl Any + Send + Sync) -> Self {
        Self { number, width, height, inner: Arc::new(inner) }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Pixel dimensions of the page painted at `scale`.
    pub fn viewport(&self, scale: f32) -> (f32, f32) {
        (self.width * scale, self.height * scale)
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageHandle")
            .field("number", &self.number)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// Supplies page objects and raster output for one document.
///
/// Pages are addressed by their 1-based number.
#[async_trait]
pub trait PageProvider: Send + Sync {
    /// Open the document at `source` and report its page count.
    ///
    /// Returns [`Load`](crate::error::ErrorKind::Load) when the document
    /// cannot be fetched or parsed.
    async fn open(&self, source: &str) -> Result<u32>;

    /// Resolve a page handle.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) for page
    /// numbers outside the document and
    /// [`Load`](crate::error::ErrorKind::Load) on transport/parse failure.
    async fn get_page(&self, number: u32) -> Result<PageHandle>;

    /// Paint `page` at `scale` onto `target`.
    ///
    /// Returns [`Render`](crate::error::ErrorKind::Render) on failure.
    async fn render(&self, page: &PageHandle, scale: f32, target: Surface) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewport_scales_dimensions() {
        let page = PageHandle::new(4, 600.0, 800.0, ());
        assert_eq!(page.number(), 4);
        assert_eq!(page.viewport(1.5), (900.0, 1200.0));
    }

    #[test]
    fn test_downcast_payload() {
        let page = PageHandle::new(1, 10.0, 10.0, String::from("payload"));
        assert_eq!(page.downcast_ref::<String>().map(String::as_str), Some("payload"));
        assert!(page.downcast_ref::<u32>().is_none());
    }
}
