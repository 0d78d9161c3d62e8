//! Viewport hook implemented by the rendering layer.

/// Measurement and scroll control for the transcript view.
///
/// The engine never forces scroll while reconciling; the only scroll it
/// performs itself is the anchor-preserving adjustment after an older page
/// lands above the fold, by exactly the measured content-height delta.
pub trait Viewport: Send + Sync {
    /// Total content height of the transcript, in layout units.
    fn content_height(&self) -> f64;

    /// Adjust the scroll offset by a relative delta.
    fn scroll_by(&self, delta: f64);
}

/// No-op viewport for headless use and tests that do not assert on scroll.
#[derive(Debug, Default)]
pub struct NullViewport;

impl Viewport for NullViewport {
    fn content_height(&self) -> f64 {
        0.0
    }

    fn scroll_by(&self, _delta: f64) {}
}
