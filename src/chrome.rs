/// Chrome extension bindings for the background coordinator and the dashboard
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use gloo_timers::future::TimeoutFuture;
use js_sys::Promise;
use log::warn;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

use crate::config::CoordinatorConfig;
use crate::coordinator::Coordinator;
use crate::error::{HostError, StoreError};
use crate::frame_data::{FrameKey, TabId};
use crate::host::{Browser, WorkspaceStore};
use crate::messages::Request;
use crate::normalize::join_extension_path;
use crate::storage;
use crate::workspace::{NewWidget, Widget, WorkspaceImport, WorkspacesDocument};

// Import JS bridge functions
#[wasm_bindgen(module = "/extension/bridge.js")]
extern "C" {
    #[wasm_bindgen(catch)]
    async fn insertCss(tab_id: i32, frame_id: i32, css: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getTabUrl(tab_id: i32) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn getStorage(key: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch)]
    async fn setStorage(key: &str, value: JsValue) -> Result<(), JsValue>;
}

/// Message of a rejected chrome.* promise
fn js_error_message(error: &JsValue) -> String {
    if let Some(error) = error.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    error.as_string().unwrap_or_else(|| format!("{:?}", error))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Failed to serialize: {:?}", e)))
}

/// chrome.scripting / chrome.tabs / timers
pub struct ChromeBrowser;

#[async_trait(?Send)]
impl Browser for ChromeBrowser {
    async fn insert_css(&self, frame: FrameKey, css: &str) -> Result<(), HostError> {
        insertCss(frame.tab_id, frame.frame_id, css)
            .await
            .map(|_| ())
            .map_err(|e| HostError::new(js_error_message(&e)))
    }

    async fn tab_url(&self, tab_id: TabId) -> Result<Option<String>, HostError> {
        getTabUrl(tab_id)
            .await
            .map(|url| url.as_string())
            .map_err(|e| HostError::new(js_error_message(&e)))
    }

    async fn sleep(&self, duration: Duration) {
        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        TimeoutFuture::new(millis).await;
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        spawn_local(task);
    }
}

/// The workspace document in chrome.storage.local
#[derive(Clone)]
pub struct ChromeStore {
    key: String,
}

#[async_trait(?Send)]
impl WorkspaceStore for ChromeStore {
    async fn load(&self) -> Result<Option<WorkspacesDocument>, StoreError> {
        let stored = getStorage(&self.key)
            .await
            .map_err(|e| StoreError::Read(js_error_message(&e)))?;

        if stored.is_null() || stored.is_undefined() {
            return Ok(None);
        }
        serde_wasm_bindgen::from_value(stored)
            .map(Some)
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }

    async fn save(&self, document: &WorkspacesDocument) -> Result<(), StoreError> {
        let value = to_js(document).map_err(|e| StoreError::Write(js_error_message(&e)))?;
        setStorage(&self.key, value)
            .await
            .map_err(|e| StoreError::Write(js_error_message(&e)))
    }
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid data: {}", e)))
}

fn store_error(error: StoreError) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn init_logging(level: log::Level) {
    static LOGGING: Once = Once::new();
    LOGGING.call_once(|| wasm_logger::init(wasm_logger::Config::new(level)));
}

fn parse_config(config: JsValue) -> (CoordinatorConfig, Option<String>) {
    if config.is_null() || config.is_undefined() {
        return (CoordinatorConfig::default(), None);
    }
    match serde_wasm_bindgen::from_value(config) {
        Ok(config) => (config, None),
        Err(e) => (CoordinatorConfig::default(), Some(e.to_string())),
    }
}

/// The service worker's handle on the coordinator
#[wasm_bindgen]
pub struct Background {
    coordinator: Coordinator<ChromeBrowser, ChromeStore>,
}

#[wasm_bindgen]
impl Background {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Background {
        let (config, config_error) = parse_config(config);
        init_logging(config.level());
        if let Some(e) = config_error {
            warn!("Invalid background config, using defaults: {}", e);
        }

        let store = ChromeStore {
            key: config.storage_key.clone(),
        };
        Background {
            coordinator: Coordinator::new(ChromeBrowser, store, config),
        }
    }

    /// Handle a runtime message. `undefined` for messages this background ignores.
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&self, message: JsValue, sender_tab_id: Option<i32>) -> Option<Promise> {
        let value: serde_json::Value = serde_wasm_bindgen::from_value(message).ok()?;
        let request = Request::from_value(value)?;
        let coordinator = self.coordinator.clone();

        Some(future_to_promise(async move {
            let response = coordinator.handle_request(sender_tab_id, request).await;
            to_js(&response)
        }))
    }

    #[wasm_bindgen(js_name = onBeforeNavigate)]
    pub fn on_before_navigate(&self, tab_id: i32, frame_id: i32, url: String) -> Promise {
        let coordinator = self.coordinator.clone();
        future_to_promise(async move {
            coordinator
                .on_before_navigate(FrameKey::new(tab_id, frame_id), &url)
                .await;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = onNavigationCompleted)]
    pub fn on_navigation_completed(&self, tab_id: i32, frame_id: i32) -> Promise {
        let coordinator = self.coordinator.clone();
        future_to_promise(async move {
            coordinator
                .on_navigation_completed(FrameKey::new(tab_id, frame_id))
                .await;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = onTabRemoved)]
    pub fn on_tab_removed(&self, tab_id: i32) -> bool {
        self.coordinator.on_tab_removed(tab_id)
    }

    /// URL to redirect to after an extension page failed to load, if any
    #[wasm_bindgen(js_name = fallbackPageFor)]
    pub fn fallback_page_for(&self, failed_url: &str, frame_id: i32, extension_base: &str) -> Option<String> {
        self.coordinator
            .fallback_page_for(failed_url, frame_id, extension_base)
    }

    /// Dashboard page opened by the toolbar action
    #[wasm_bindgen(js_name = dashboardUrl)]
    pub fn dashboard_url(&self, extension_base: &str) -> String {
        join_extension_path(extension_base, &self.coordinator.config().dashboard_path)
    }
}

/// The dashboard's handle on the stored workspaces.
///
/// Every edit resolves to the document as saved.
#[wasm_bindgen]
pub struct Workspaces {
    store: ChromeStore,
}

impl Workspaces {
    fn edit(&self, change: impl FnOnce(&mut WorkspacesDocument) -> bool + 'static) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let doc = storage::edit_workspaces(&store, change)
                .await
                .map_err(store_error)?;
            to_js(&doc)
        })
    }
}

#[wasm_bindgen]
impl Workspaces {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Workspaces {
        let (config, config_error) = parse_config(config);
        init_logging(config.level());
        if let Some(e) = config_error {
            warn!("Invalid dashboard config, using defaults: {}", e);
        }

        Workspaces {
            store: ChromeStore {
                key: config.storage_key,
            },
        }
    }

    pub fn load(&self) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let doc = storage::load_workspaces(&store).await.map_err(store_error)?;
            to_js(&doc)
        })
    }

    #[wasm_bindgen(js_name = setActiveWorkspace)]
    pub fn set_active_workspace(&self, workspace_id: String) -> Promise {
        self.edit(move |doc| doc.set_active_workspace(&workspace_id))
    }

    #[wasm_bindgen(js_name = addWorkspace)]
    pub fn add_workspace(&self, name: String) -> Promise {
        self.edit(move |doc| {
            doc.add_workspace(&name);
            true
        })
    }

    #[wasm_bindgen(js_name = removeWorkspace)]
    pub fn remove_workspace(&self, workspace_id: String) -> Promise {
        self.edit(move |doc| doc.remove_workspace(&workspace_id))
    }

    #[wasm_bindgen(js_name = renameWorkspace)]
    pub fn rename_workspace(&self, workspace_id: String, name: String) -> Promise {
        self.edit(move |doc| doc.rename_workspace(&workspace_id, &name))
    }

    /// Add `{title, url, customCss?, position?, width?, height?}` to the active workspace
    #[wasm_bindgen(js_name = addWidget)]
    pub fn add_widget(&self, widget: JsValue) -> Result<Promise, JsValue> {
        let widget: NewWidget = from_js(widget)?;
        Ok(self.edit(move |doc| doc.add_widget(widget).is_some()))
    }

    #[wasm_bindgen(js_name = removeWidget)]
    pub fn remove_widget(&self, widget_id: String) -> Promise {
        self.edit(move |doc| doc.remove_widget(&widget_id))
    }

    #[wasm_bindgen(js_name = updateWidget)]
    pub fn update_widget(&self, widget: JsValue) -> Result<Promise, JsValue> {
        let widget: Widget = from_js(widget)?;
        Ok(self.edit(move |doc| doc.update_widget(widget)))
    }

    /// Import a parsed workspace file: one workspace or an array of them
    #[wasm_bindgen(js_name = importWorkspaces)]
    pub fn import_workspaces(&self, data: JsValue) -> Result<Promise, JsValue> {
        let imported: WorkspaceImport = from_js(data)?;
        Ok(self.edit(move |doc| doc.import_workspaces(imported.into_workspaces()) > 0))
    }

    /// `{fileName, contents}` for downloading a workspace, `null` if unknown
    #[wasm_bindgen(js_name = exportWorkspace)]
    pub fn export_workspace(&self, workspace_id: String) -> Promise {
        let store = self.store.clone();
        future_to_promise(async move {
            let doc = storage::load_workspaces(&store).await.map_err(store_error)?;
            let Some(workspace) = doc.workspaces.iter().find(|ws| ws.id == workspace_id) else {
                warn!("exportWorkspace: workspace {} not found", workspace_id);
                return Ok(JsValue::NULL);
            };
            let export = workspace
                .export()
                .map_err(|e| JsValue::from_str(&format!("Failed to serialize: {}", e)))?;
            to_js(&export)
        })
    }
}
