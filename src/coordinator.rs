/// Frame registry and CSS injection coordinator
///
/// Handlers run on the extension's single-threaded event loop. The registry
/// is borrowed only between suspension points; every continuation re-reads
/// the binding it cares about by key before acting on its result.
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use log::{debug, error, info, warn};

use crate::config::CoordinatorConfig;
use crate::error::{CoordinatorError, InjectionError};
use crate::frame_data::{FrameKey, TabId};
use crate::host::{Browser, WorkspaceStore};
use crate::messages::{
    BeginTracking, CSS_EMPTY_MESSAGE, CSS_QUEUED_MESSAGE, CSS_SKIPPED_MESSAGE, EndTracking, InjectCss,
    Request, Response, non_empty,
};
use crate::normalize::{fallback_page_for, is_extension_url, is_internal_url, normalize_url};
use crate::registry::FrameRegistry;
use crate::storage;

/// Result of one pass of the injection algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Injection {
    Applied,
    /// The tab now shows an extension page; nothing to style
    Skipped,
    /// Newer CSS was accepted for the widget while this attempt waited
    Superseded,
}

/// What happened to CSS handed to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CssOutcome {
    Applied,
    Skipped,
    /// Kept as pending until the widget's frame is ready
    Queued,
    /// Blank CSS; pending entry cleared
    Cleared,
    /// Widget was unregistered, or newer CSS replaced this one, while the
    /// injection was in flight
    Discarded,
}

impl From<CssOutcome> for Response {
    fn from(outcome: CssOutcome) -> Self {
        match outcome {
            CssOutcome::Applied | CssOutcome::Discarded => Response::ok(),
            CssOutcome::Skipped => Response::ok_with(CSS_SKIPPED_MESSAGE),
            CssOutcome::Queued => Response::ok_with(CSS_QUEUED_MESSAGE),
            CssOutcome::Cleared => Response::ok_with(CSS_EMPTY_MESSAGE),
        }
    }
}

struct Inner<B, S> {
    browser: B,
    store: S,
    config: CoordinatorConfig,
    registry: RefCell<FrameRegistry>,
}

/// Cheap to clone; clones share the same registry
pub struct Coordinator<B, S> {
    inner: Rc<Inner<B, S>>,
}

impl<B, S> Clone for Coordinator<B, S> {
    fn clone(&self) -> Self {
        Coordinator {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<B, S> Coordinator<B, S>
where
    B: Browser + 'static,
    S: WorkspaceStore + 'static,
{
    pub fn new(browser: B, store: S, config: CoordinatorConfig) -> Self {
        Coordinator {
            inner: Rc::new(Inner {
                browser,
                store,
                config,
                registry: RefCell::new(FrameRegistry::new()),
            }),
        }
    }

    pub fn browser(&self) -> &B {
        &self.inner.browser
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    /// Read-only view of the registry
    pub fn inspect<R>(&self, f: impl FnOnce(&FrameRegistry) -> R) -> R {
        f(&self.registry())
    }

    fn registry(&self) -> Ref<'_, FrameRegistry> {
        self.inner.registry.borrow()
    }

    fn registry_mut(&self) -> RefMut<'_, FrameRegistry> {
        self.inner.registry.borrow_mut()
    }

    /// Dispatch a dashboard request
    pub async fn handle_request(&self, sender_tab: Option<TabId>, request: Request) -> Response {
        match request {
            Request::BeginTracking(payload) => match self.begin_tracking(sender_tab, &payload) {
                Ok(()) => Response::ok(),
                Err(e) => e.into(),
            },
            Request::InjectCss(payload) => match self.request_css_injection(&payload).await {
                Ok(outcome) => outcome.into(),
                Err(e) => e.into(),
            },
            Request::EndTracking(payload) => match self.end_tracking(&payload) {
                Ok(()) => Response::ok(),
                Err(e) => e.into(),
            },
        }
    }

    /// Start tracking a widget announced by the dashboard in `sender_tab`.
    ///
    /// Binds immediately when a frame of that tab already shows the widget's
    /// source URL, then applies its CSS in the background. Otherwise the
    /// widget waits for a matching frame to finish loading.
    pub fn begin_tracking(
        &self,
        sender_tab: Option<TabId>,
        payload: &BeginTracking,
    ) -> Result<(), CoordinatorError> {
        let Some(tab_id) = sender_tab else {
            warn!("BEGIN_TRACKING: missing tabId from sender");
            return Err(CoordinatorError::MissingTabId);
        };
        let (Some(widget_id), Some(raw_src)) = (non_empty(&payload.widget_id), non_empty(&payload.widget_src))
        else {
            warn!("BEGIN_TRACKING: missing payload data {:?}", payload);
            return Err(CoordinatorError::MissingPayload);
        };

        let source_url = normalize_url(raw_src);
        info!(
            "BEGIN_TRACKING for widget {}, raw src: {}, normalized: {}, tab: {}",
            widget_id, raw_src, source_url, tab_id
        );

        let matched = {
            let mut registry = self.registry_mut();
            registry.mark_tab_active(tab_id);
            registry.detach_widget(widget_id);

            match registry.find_unbound_frame(tab_id, &source_url) {
                Some(frame) => {
                    registry.bind(widget_id, frame, source_url);
                    Some(frame)
                }
                None => {
                    registry.await_frame(widget_id, tab_id, source_url);
                    None
                }
            }
        };

        match matched {
            Some(frame) => {
                info!("Matched widget {} with existing frame {}", widget_id, frame);
                let this = self.clone();
                let widget_id = widget_id.to_string();
                self.inner.browser.spawn(Box::pin(async move {
                    this.apply_css_to_frame(&widget_id, frame).await;
                }));
            }
            None => info!("No matching frame for widget {}, waiting for navigation", widget_id),
        }
        Ok(())
    }

    /// Persist a widget's CSS and apply it now if its frame is known.
    pub async fn request_css_injection(&self, payload: &InjectCss) -> Result<CssOutcome, CoordinatorError> {
        let Some(widget_id) = non_empty(&payload.widget_id) else {
            warn!("INJECT_CSS: missing widgetId {:?}", payload);
            return Err(CoordinatorError::MissingWidgetId);
        };
        let css = payload.css.clone().unwrap_or_default();
        info!("INJECT_CSS for widget {}, CSS defined: {}", widget_id, !css.is_empty());

        let revision = self.registry_mut().record_css_write(widget_id);
        storage::save_widget_css(&self.inner.store, widget_id, &css).await;

        if !self.registry().is_current_css(widget_id, revision) {
            debug!("Newer CSS arrived for widget {} while saving", widget_id);
            return Ok(CssOutcome::Discarded);
        }

        if css.trim().is_empty() {
            if self.registry_mut().clear_pending_css(widget_id) {
                debug!("Cleared pending CSS for widget {}", widget_id);
            }
            info!("CSS for widget {} is empty, nothing to inject", widget_id);
            return Ok(CssOutcome::Cleared);
        }

        let bound_frame = self.registry().binding(widget_id).map(|binding| binding.frame);
        let Some(frame) = bound_frame else {
            info!("Widget {} not mapped, queuing CSS", widget_id);
            self.registry_mut().queue_css(widget_id, css);
            return Ok(CssOutcome::Queued);
        };

        let result = self.inject(widget_id, revision, frame, &css).await;
        Ok(self.record_injection(widget_id, revision, frame, css, result))
    }

    /// Stop tracking a widget. Unknown widgets are a no-op.
    pub fn end_tracking(&self, payload: &EndTracking) -> Result<(), CoordinatorError> {
        let Some(widget_id) = non_empty(&payload.widget_id) else {
            warn!("END_TRACKING: missing widgetId {:?}", payload);
            return Err(CoordinatorError::MissingWidgetId);
        };

        if self.registry_mut().forget_widget(widget_id) {
            info!("END_TRACKING: widget {} unmapped", widget_id);
        } else {
            debug!("END_TRACKING: widget {} was not tracked", widget_id);
        }
        Ok(())
    }

    /// A frame is about to load `url`
    pub async fn on_before_navigate(&self, frame: FrameKey, url: &str) {
        if frame.is_top_frame() || is_internal_url(url) {
            return;
        }

        let normalized = normalize_url(url);
        let widget_id = self.registry_mut().record_navigation(frame, normalized.clone());
        info!(
            "Navigation in frame {}: {} (widget: {:?})",
            frame, normalized, widget_id
        );

        if let Some(widget_id) = widget_id {
            storage::save_widget_url(&self.inner.store, &widget_id, url).await;
        }
    }

    /// A frame finished loading; (re)apply its widget's CSS
    pub async fn on_navigation_completed(&self, frame: FrameKey) {
        if frame.is_top_frame() {
            return;
        }

        let widget_id = {
            let mut registry = self.registry_mut();
            let bound = registry.bound_widget(frame).map(str::to_string);
            bound.or_else(|| registry.claim_frame_for_awaiting(frame))
        };
        let Some(widget_id) = widget_id else {
            return;
        };

        info!("Frame {} completed loading for widget {}", frame, widget_id);
        self.apply_css_to_frame(&widget_id, frame).await;
    }

    /// A tab was closed. Returns whether it held any tracked state.
    pub fn on_tab_removed(&self, tab_id: TabId) -> bool {
        match self.registry_mut().remove_tab(tab_id) {
            Some(removed) => {
                info!("Tab {} removed, dropped widgets {:?}", tab_id, removed);
                true
            }
            None => false,
        }
    }

    /// Where to send a tab whose extension page failed to load
    pub fn fallback_page_for(&self, failed_url: &str, frame_id: i32, extension_base: &str) -> Option<String> {
        fallback_page_for(failed_url, frame_id, extension_base, &self.inner.config.fallback_page)
    }

    /// Apply pending CSS, or else the saved CSS, to a freshly bound or loaded frame
    async fn apply_css_to_frame(&self, widget_id: &str, frame: FrameKey) {
        let (pending, revision) = {
            let mut registry = self.registry_mut();
            (registry.take_pending_css(widget_id), registry.css_revision(widget_id))
        };
        let css = match pending {
            Some(css) => {
                info!("Injecting queued CSS for widget {}", widget_id);
                css
            }
            None => match storage::load_widget_css(&self.inner.store, widget_id).await {
                Some(css) => {
                    info!("Loading saved CSS for widget {}", widget_id);
                    css
                }
                None => {
                    debug!("No CSS to apply for widget {}", widget_id);
                    return;
                }
            },
        };

        self.inject_when_ready(widget_id, revision, frame, css).await;
    }

    /// Wait for the frame to settle, check it still hosts the widget and the
    /// CSS is still the newest, then inject
    async fn inject_when_ready(&self, widget_id: &str, revision: u64, frame: FrameKey, css: String) -> CssOutcome {
        self.inner.browser.sleep(self.inner.config.settle_delay()).await;

        {
            let mut registry = self.registry_mut();
            if !registry.is_current_css(widget_id, revision) {
                debug!("Newer CSS accepted for widget {}, dropping stale CSS", widget_id);
                return CssOutcome::Discarded;
            }
            if !registry.is_bound_to(widget_id, frame) {
                if registry.tracking_state(widget_id).is_tracked() {
                    warn!("Frame mapping changed for widget {}, queueing CSS", widget_id);
                    registry.queue_css(widget_id, css);
                    return CssOutcome::Queued;
                }
                debug!("Widget {} no longer tracked, dropping CSS", widget_id);
                return CssOutcome::Discarded;
            }
        }

        let result = self.inject(widget_id, revision, frame, &css).await;
        self.record_injection(widget_id, revision, frame, css, result)
    }

    /// Update the registry with the result of an injection attempt
    fn record_injection(
        &self,
        widget_id: &str,
        revision: u64,
        frame: FrameKey,
        css: String,
        result: Result<Injection, InjectionError>,
    ) -> CssOutcome {
        let mut registry = self.registry_mut();
        let current = registry.is_current_css(widget_id, revision);

        match result {
            Ok(Injection::Skipped) => CssOutcome::Skipped,
            Ok(Injection::Superseded) => {
                debug!("Newer CSS accepted for widget {}, retry dropped", widget_id);
                CssOutcome::Discarded
            }
            Ok(Injection::Applied) if registry.mark_css_injected(widget_id, frame) => {
                if current {
                    registry.clear_pending_css(widget_id);
                }
                info!("CSS injected into widget {} (frame {})", widget_id, frame);
                CssOutcome::Applied
            }
            outcome => {
                match outcome {
                    Err(e) => error!("Failed to inject CSS into widget {}: {}", widget_id, e),
                    Ok(_) => warn!("Widget {} left frame {} during injection", widget_id, frame),
                }
                if !current {
                    debug!("Newer CSS accepted for widget {}, not queueing", widget_id);
                    CssOutcome::Discarded
                } else if registry.tracking_state(widget_id).is_tracked() {
                    registry.queue_css(widget_id, css);
                    CssOutcome::Queued
                } else {
                    debug!("Widget {} no longer tracked, dropping CSS", widget_id);
                    CssOutcome::Discarded
                }
            }
        }
    }

    /// Insert CSS into one frame, retrying once after an access error.
    ///
    /// The retry is abandoned when newer CSS than `revision` was accepted
    /// for the widget during the backoff.
    pub async fn inject(
        &self,
        widget_id: &str,
        revision: u64,
        frame: FrameKey,
        css: &str,
    ) -> Result<Injection, InjectionError> {
        let browser = &self.inner.browser;

        match browser.insert_css(frame, css).await {
            Ok(()) => return Ok(Injection::Applied),
            Err(e) if !e.is_access_denied() => return Err(InjectionError::Insert(e)),
            Err(e) => warn!(
                "Frame {} not accessible yet ({}), retrying in {:?}",
                frame,
                e,
                self.inner.config.retry_backoff()
            ),
        }

        browser.sleep(self.inner.config.retry_backoff()).await;

        let tab_url = browser.tab_url(frame.tab_id).await.map_err(InjectionError::TabLookup)?;
        if let Some(url) = tab_url.filter(|url| is_extension_url(url)) {
            info!("Skipping CSS injection for extension URL: {}", url);
            return Ok(Injection::Skipped);
        }
        if !self.registry().is_current_css(widget_id, revision) {
            return Ok(Injection::Superseded);
        }

        browser
            .insert_css(frame, css)
            .await
            .map(|()| Injection::Applied)
            .map_err(InjectionError::Retry)
    }
}
