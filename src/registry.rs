/// In-memory widget/frame registry
///
/// Owns the widget→frame bindings and their mirror, the frame→location map.
/// Every mutation goes through these methods so the two maps never drift:
/// a location's `widget_id` is set exactly when that widget's binding points
/// back at the location's key.
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::frame_data::{
    AwaitingWidget, FrameId, FrameKey, FrameLocation, TabId, TrackingState, WidgetFrameBinding,
};

#[derive(Debug, Default)]
pub struct FrameRegistry {
    bindings: HashMap<String, WidgetFrameBinding>,
    frames: BTreeMap<FrameKey, FrameLocation>,
    awaiting: BTreeMap<String, AwaitingWidget>,
    pending_css: HashMap<String, String>,
    /// Revision of the newest CSS accepted for each widget
    css_revisions: HashMap<String, u64>,
    last_css_revision: u64,
    active_tabs: HashSet<TabId>,
}

fn tab_range(tab_id: TabId) -> std::ops::RangeInclusive<FrameKey> {
    FrameKey::new(tab_id, FrameId::MIN)..=FrameKey::new(tab_id, FrameId::MAX)
}

impl FrameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_tab_active(&mut self, tab_id: TabId) {
        self.active_tabs.insert(tab_id);
    }

    pub fn is_tab_active(&self, tab_id: TabId) -> bool {
        self.active_tabs.contains(&tab_id)
    }

    pub fn tracking_state(&self, widget_id: &str) -> TrackingState {
        if let Some(binding) = self.bindings.get(widget_id) {
            TrackingState::Bound {
                css_injected: binding.css_injected,
            }
        } else if self.awaiting.contains_key(widget_id) {
            TrackingState::AwaitingFrame
        } else {
            TrackingState::Unregistered
        }
    }

    pub fn binding(&self, widget_id: &str) -> Option<&WidgetFrameBinding> {
        self.bindings.get(widget_id)
    }

    pub fn frame_location(&self, frame: FrameKey) -> Option<&FrameLocation> {
        self.frames.get(&frame)
    }

    pub fn pending_css(&self, widget_id: &str) -> Option<&str> {
        self.pending_css.get(widget_id).map(String::as_str)
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Whether the widget is still bound to exactly this frame
    pub fn is_bound_to(&self, widget_id: &str, frame: FrameKey) -> bool {
        self.bindings
            .get(widget_id)
            .is_some_and(|binding| binding.frame == frame)
    }

    pub fn bound_widget(&self, frame: FrameKey) -> Option<&str> {
        self.frames.get(&frame)?.widget_id.as_deref()
    }

    /// First unbound frame of the tab currently showing `source_url` (normalized)
    pub fn find_unbound_frame(&self, tab_id: TabId, source_url: &str) -> Option<FrameKey> {
        self.frames
            .range(tab_range(tab_id))
            .find(|(_, location)| location.widget_id.is_none() && location.url == source_url)
            .map(|(key, _)| *key)
    }

    /// Release the widget's binding and awaiting record. The frame location
    /// stays, unbound, so the widget can be matched to it again.
    pub fn detach_widget(&mut self, widget_id: &str) -> Option<WidgetFrameBinding> {
        self.awaiting.remove(widget_id);
        let binding = self.bindings.remove(widget_id)?;
        if let Some(location) = self.frames.get_mut(&binding.frame) {
            location.widget_id = None;
        }
        Some(binding)
    }

    /// Drop everything known about the widget, including its frame location
    /// and pending CSS. Returns whether anything was removed.
    pub fn forget_widget(&mut self, widget_id: &str) -> bool {
        let was_awaiting = self.awaiting.contains_key(widget_id);
        let binding = self.detach_widget(widget_id);
        if let Some(binding) = &binding {
            self.frames.remove(&binding.frame);
        }
        let had_pending = self.pending_css.remove(widget_id).is_some();

        binding.is_some() || was_awaiting || had_pending
    }

    /// Bind a widget to an unbound frame, replacing any previous binding of
    /// the widget.
    pub fn bind(&mut self, widget_id: &str, frame: FrameKey, source_url: String) {
        self.detach_widget(widget_id);
        debug_assert!(
            self.bound_widget(frame).is_none(),
            "frame {} is already bound",
            frame
        );

        self.frames.insert(
            frame,
            FrameLocation {
                url: source_url.clone(),
                widget_id: Some(widget_id.to_string()),
            },
        );
        self.bindings.insert(
            widget_id.to_string(),
            WidgetFrameBinding {
                frame,
                source_url,
                css_injected: false,
            },
        );
    }

    /// Record a widget that was announced before any matching frame was seen
    pub fn await_frame(&mut self, widget_id: &str, tab_id: TabId, source_url: String) {
        self.detach_widget(widget_id);
        self.awaiting
            .insert(widget_id.to_string(), AwaitingWidget { tab_id, source_url });
    }

    /// Create or update a frame's location. Returns the widget bound to it.
    ///
    /// A bound frame loading a new document loses whatever CSS was injected
    /// into the previous one.
    pub fn record_navigation(&mut self, frame: FrameKey, normalized_url: String) -> Option<String> {
        let location = self.frames.entry(frame).or_insert_with(|| FrameLocation {
            url: String::new(),
            widget_id: None,
        });
        location.url = normalized_url;

        let widget_id = location.widget_id.clone()?;
        if let Some(binding) = self.bindings.get_mut(&widget_id) {
            binding.css_injected = false;
        }
        Some(widget_id)
    }

    /// Bind an unbound frame to an awaiting widget of the same tab and URL.
    /// Returns the widget id that was bound.
    pub fn claim_frame_for_awaiting(&mut self, frame: FrameKey) -> Option<String> {
        let location = self.frames.get(&frame)?;
        if location.widget_id.is_some() {
            return None;
        }

        let widget_id = self
            .awaiting
            .iter()
            .find(|(_, waiting)| waiting.tab_id == frame.tab_id && waiting.source_url == location.url)
            .map(|(id, _)| id.clone())?;
        let source_url = location.url.clone();

        self.bind(&widget_id, frame, source_url);
        Some(widget_id)
    }

    /// Set `css_injected` if the widget is still bound to `frame`
    pub fn mark_css_injected(&mut self, widget_id: &str, frame: FrameKey) -> bool {
        match self.bindings.get_mut(widget_id) {
            Some(binding) if binding.frame == frame => {
                binding.css_injected = true;
                true
            }
            _ => false,
        }
    }

    /// Note newly accepted CSS for a widget. In-flight injections holding an
    /// older revision are stale from now on.
    pub fn record_css_write(&mut self, widget_id: &str) -> u64 {
        self.last_css_revision += 1;
        self.css_revisions
            .insert(widget_id.to_string(), self.last_css_revision);
        self.last_css_revision
    }

    /// Revision of the newest CSS accepted for the widget, 0 if none
    pub fn css_revision(&self, widget_id: &str) -> u64 {
        self.css_revisions.get(widget_id).copied().unwrap_or(0)
    }

    pub fn is_current_css(&self, widget_id: &str, revision: u64) -> bool {
        self.css_revision(widget_id) == revision
    }

    /// Last write wins
    pub fn queue_css(&mut self, widget_id: &str, css: String) {
        self.pending_css.insert(widget_id.to_string(), css);
    }

    pub fn take_pending_css(&mut self, widget_id: &str) -> Option<String> {
        self.pending_css.remove(widget_id)
    }

    pub fn clear_pending_css(&mut self, widget_id: &str) -> bool {
        self.pending_css.remove(widget_id).is_some()
    }

    /// Drop every frame, binding, awaiting record and pending CSS of a tab.
    ///
    /// Returns `None` when the tab never announced a widget, otherwise the
    /// widget ids that were dropped.
    pub fn remove_tab(&mut self, tab_id: TabId) -> Option<Vec<String>> {
        if !self.active_tabs.remove(&tab_id) {
            return None;
        }

        let keys: Vec<FrameKey> = self.frames.range(tab_range(tab_id)).map(|(key, _)| *key).collect();
        let mut removed = Vec::new();

        for key in keys {
            if let Some(widget_id) = self.frames.remove(&key).and_then(|location| location.widget_id) {
                self.bindings.remove(&widget_id);
                removed.push(widget_id);
            }
        }

        let waiting_here: Vec<String> = self
            .awaiting
            .iter()
            .filter(|(_, waiting)| waiting.tab_id == tab_id)
            .map(|(id, _)| id.clone())
            .collect();
        for widget_id in waiting_here {
            self.awaiting.remove(&widget_id);
            removed.push(widget_id);
        }

        for widget_id in &removed {
            self.pending_css.remove(widget_id);
        }

        Some(removed)
    }
}
