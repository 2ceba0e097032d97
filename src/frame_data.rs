/// Data structures for widget/frame tracking
use std::fmt;

pub type TabId = i32;
pub type FrameId = i32;

/// Frame id the browser assigns to a tab's top-level document
pub const TOP_FRAME_ID: FrameId = 0;

/// Composite key of a browser frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameKey {
    pub tab_id: TabId,
    pub frame_id: FrameId,
}

impl FrameKey {
    pub fn new(tab_id: TabId, frame_id: FrameId) -> FrameKey {
        FrameKey { tab_id, frame_id }
    }

    pub fn is_top_frame(&self) -> bool {
        self.frame_id == TOP_FRAME_ID
    }
}

impl fmt::Display for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.tab_id, self.frame_id)
    }
}

/// A widget currently hosted in a specific frame
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetFrameBinding {
    pub frame: FrameKey,
    /// Normalized source URL the widget was matched on
    pub source_url: String,
    pub css_injected: bool,
}

/// Last known state of a frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLocation {
    /// Normalized URL
    pub url: String,
    pub widget_id: Option<String>,
}

/// A widget announced by the GUI that has no frame yet
#[derive(Debug, Clone, PartialEq)]
pub struct AwaitingWidget {
    pub tab_id: TabId,
    pub source_url: String,
}

/// Lifecycle state of a widget id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Unregistered,
    AwaitingFrame,
    Bound { css_injected: bool },
}

impl TrackingState {
    pub fn is_tracked(&self) -> bool {
        !matches!(self, TrackingState::Unregistered)
    }
}
