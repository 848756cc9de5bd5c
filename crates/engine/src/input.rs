//! Mapping reader input to engine commands.
//!
//! Hosts translate key presses with [`Command::from_key`] and touch
//! gestures with a [`SwipeTracker`], then hand the resulting [`Command`] to
//! [`Storybook::dispatch`].

use crate::book::Storybook;

/// A reader action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    PrevPage,
    NextPage,
    TogglePlayPause,
    ToggleMute,
    /// Restart the narration for the current view.
    Replay,
    /// The reader accepted the "enable sound" prompt.
    EnableSound,
}

impl Command {
    /// Keyboard shortcut for a DOM-style key name.
    ///
    /// ```
    /// use storybook_engine::Command;
    ///
    /// assert_eq!(Command::from_key("ArrowRight"), Some(Command::NextPage));
    /// assert_eq!(Command::from_key("M"), Some(Command::ToggleMute));
    /// assert_eq!(Command::from_key("Enter"), None);
    /// ```
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(Self::PrevPage),
            "ArrowRight" => Some(Self::NextPage),
            " " => Some(Self::TogglePlayPause),
            "m" | "M" => Some(Self::ToggleMute),
            _ => None,
        }
    }

    /// Whether issuing this command counts as a gesture that unlocks narration.
    pub fn is_gesture(&self) -> bool {
        matches!(self, Self::PrevPage | Self::NextPage | Self::Replay | Self::EnableSound)
    }
}

/// Recognises horizontal swipes from single-finger touch events.
///
/// A touch becomes a swipe once it has moved more than
/// [`MOVE_THRESHOLD`](Self::MOVE_THRESHOLD) on either axis. On release it
/// turns the page when it travelled more than
/// [`SWIPE_DISTANCE`](Self::SWIPE_DISTANCE) horizontally and less than
/// [`MAX_VERTICAL_DRIFT`](Self::MAX_VERTICAL_DRIFT) vertically. Swiping
/// right goes back, swiping left goes forward.
#[derive(Clone, Debug, Default)]
pub struct SwipeTracker {
    origin: Option<(f64, f64)>,
    swiping: bool,
}

impl SwipeTracker {
    pub const MOVE_THRESHOLD: f64 = 10.0;
    pub const SWIPE_DISTANCE: f64 = 50.0;
    pub const MAX_VERTICAL_DRIFT: f64 = 100.0;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch_start(&mut self, x: f64, y: f64) {
        self.origin = Some((x, y));
        self.swiping = false;
    }

    pub fn touch_move(&mut self, x: f64, y: f64) {
        if let Some((ox, oy)) = self.origin
            && ((x - ox).abs() > Self::MOVE_THRESHOLD || (y - oy).abs() > Self::MOVE_THRESHOLD)
        {
            self.swiping = true;
        }
    }

    /// Finish the touch, returning the page turn it amounts to, if any.
    pub fn touch_end(&mut self, x: f64, y: f64) -> Option<Command> {
        let origin = self.origin.take();
        let swiping = std::mem::take(&mut self.swiping);
        let (ox, oy) = origin.filter(|_| swiping)?;
        let (dx, dy) = (x - ox, (y - oy).abs());
        if dx.abs() <= Self::SWIPE_DISTANCE || dy >= Self::MAX_VERTICAL_DRIFT {
            return None;
        }
        Some(if dx > 0.0 { Command::PrevPage } else { Command::NextPage })
    }
}

impl Storybook {
    /// Run `command` on behalf of the reader.
    ///
    /// Page turns, replay and enabling sound are gestures and unlock
    /// narration before they run. Only enabling sound resumes a paused clip.
    pub async fn dispatch(&self, command: Command) {
        tracing::debug!(?command, "Dispatching command");
        if command.is_gesture() {
            self.unlock_narration();
        }
        match command {
            Command::PrevPage => {
                self.prev_page().await;
            },
            Command::NextPage => {
                self.next_page().await;
            },
            Command::TogglePlayPause => {
                self.toggle_play_pause().await;
            },
            Command::ToggleMute => {
                self.toggle_mute();
            },
            Command::Replay => {
                self.replay().await;
            },
            Command::EnableSound => {
                self.enable_sound().await;
            },
        }
    }
}
