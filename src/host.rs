/// Async seams between the coordinator and the browser platform
use async_trait::async_trait;
use futures::future::LocalBoxFuture;
use std::time::Duration;

use crate::error::{HostError, StoreError};
use crate::frame_data::{FrameKey, TabId};
use crate::workspace::WorkspacesDocument;

/// Browser operations the coordinator depends on
#[async_trait(?Send)]
pub trait Browser {
    /// Insert a stylesheet into one frame
    async fn insert_css(&self, frame: FrameKey, css: &str) -> Result<(), HostError>;

    /// URL currently shown by the tab's top-level document
    async fn tab_url(&self, tab_id: TabId) -> Result<Option<String>, HostError>;

    async fn sleep(&self, duration: Duration);

    /// Run a task in the background on the current thread
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}

/// Whole-document access to the persisted workspaces
#[async_trait(?Send)]
pub trait WorkspaceStore {
    /// `Ok(None)` when nothing has been stored yet
    async fn load(&self) -> Result<Option<WorkspacesDocument>, StoreError>;

    async fn save(&self, document: &WorkspacesDocument) -> Result<(), StoreError>;
}
