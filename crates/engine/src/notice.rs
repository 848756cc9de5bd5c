use crate::error::ErrorKind;
use tokio::sync::mpsc;

/// A user-facing condition raised by the engine.
///
/// Notices are informational: none of them means the engine stopped
/// accepting requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    /// A transient failure (page resolution, paint, narration load).
    Warning(ErrorKind),
    /// Playback was refused until the user enables sound.
    EnableSound,
    /// The visible pages have no narration.
    NoNarration,
    /// Play was requested with no clip assigned.
    NothingToPlay,
}

/// Receiving end handed to the host by [`Storybook::open`](crate::Storybook::open).
pub type Notices = mpsc::UnboundedReceiver<Notice>;

#[derive(Clone, Debug)]
pub(crate) struct Notifier {
    tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
    pub(crate) fn channel() -> (Self, Notices) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub(crate) fn send(&self, notice: Notice) {
        if let Err(err) = self.tx.send(notice) {
            tracing::trace!(notice = ?err.0, "Notice receiver dropped");
        }
    }

    pub(crate) fn warn(&self, kind: ErrorKind) {
        self.send(Notice::Warning(kind));
    }
}
