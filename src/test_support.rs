/// In-memory browser and storage fakes for coordinator tests
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::task::Poll;
use std::time::Duration;

use async_trait::async_trait;
use futures::executor::{LocalPool, LocalSpawner};
use futures::future::LocalBoxFuture;
use futures::task::LocalSpawnExt;

use crate::config::CoordinatorConfig;
use crate::coordinator::Coordinator;
use crate::error::{HostError, StoreError};
use crate::frame_data::{FrameKey, TabId};
use crate::host::{Browser, WorkspaceStore};
use crate::workspace::{Position, Widget, WorkspacesDocument};

/// Records calls. A sleep runs any queued hook, then yields once so other
/// tasks on the pool get to run before it returns.
pub struct FakeBrowser {
    spawner: LocalSpawner,
    inserts: RefCell<Vec<(FrameKey, String)>>,
    insert_results: RefCell<VecDeque<Result<(), HostError>>>,
    tab_urls: RefCell<HashMap<TabId, String>>,
    sleeps: RefCell<Vec<Duration>>,
    sleep_hooks: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl FakeBrowser {
    pub fn new(spawner: LocalSpawner) -> Self {
        FakeBrowser {
            spawner,
            inserts: RefCell::new(Vec::new()),
            insert_results: RefCell::new(VecDeque::new()),
            tab_urls: RefCell::new(HashMap::new()),
            sleeps: RefCell::new(Vec::new()),
            sleep_hooks: RefCell::new(VecDeque::new()),
        }
    }

    /// Every insertCSS attempt, successful or not
    pub fn inserts(&self) -> Vec<(FrameKey, String)> {
        self.inserts.borrow().clone()
    }

    /// Result for the next insertCSS call; calls without one succeed
    pub fn push_insert_result(&self, result: Result<(), HostError>) {
        self.insert_results.borrow_mut().push_back(result);
    }

    pub fn set_tab_url(&self, tab_id: TabId, url: &str) {
        self.tab_urls.borrow_mut().insert(tab_id, url.to_string());
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    /// Run `hook` while the next sleep is in progress
    pub fn on_next_sleep(&self, hook: impl FnOnce() + 'static) {
        self.sleep_hooks.borrow_mut().push_back(Box::new(hook));
    }
}

#[async_trait(?Send)]
impl Browser for FakeBrowser {
    async fn insert_css(&self, frame: FrameKey, css: &str) -> Result<(), HostError> {
        self.inserts.borrow_mut().push((frame, css.to_string()));
        self.insert_results.borrow_mut().pop_front().unwrap_or(Ok(()))
    }

    async fn tab_url(&self, tab_id: TabId) -> Result<Option<String>, HostError> {
        self.tab_urls
            .borrow()
            .get(&tab_id)
            .map(|url| Some(url.clone()))
            .ok_or_else(|| HostError::new(format!("No tab with id: {}.", tab_id)))
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        let hook = self.sleep_hooks.borrow_mut().pop_front();
        if let Some(hook) = hook {
            hook();
        }

        let mut yielded = false;
        futures::future::poll_fn(|cx| {
            if yielded {
                Poll::Ready(())
            } else {
                yielded = true;
                cx.waker().wake_by_ref();
                Poll::Pending
            }
        })
        .await;
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        self.spawner.spawn_local(task).expect("test pool accepts tasks");
    }
}

/// Workspace document held in memory
#[derive(Default)]
pub struct FakeStore {
    document: RefCell<Option<WorkspacesDocument>>,
    saves: Cell<usize>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl FakeStore {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_document(document: WorkspacesDocument) -> Self {
        FakeStore {
            document: RefCell::new(Some(document)),
            ..Self::default()
        }
    }

    pub fn document(&self) -> Option<WorkspacesDocument> {
        self.document.borrow().clone()
    }

    pub fn widget(&self, widget_id: &str) -> Option<Widget> {
        self.document.borrow().as_ref()?.find_widget(widget_id).cloned()
    }

    pub fn save_count(&self) -> usize {
        self.saves.get()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

#[async_trait(?Send)]
impl WorkspaceStore for FakeStore {
    async fn load(&self) -> Result<Option<WorkspacesDocument>, StoreError> {
        if self.fail_reads.get() {
            return Err(StoreError::Read("quota exceeded".to_string()));
        }
        Ok(self.document.borrow().clone())
    }

    async fn save(&self, document: &WorkspacesDocument) -> Result<(), StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::Write("quota exceeded".to_string()));
        }
        *self.document.borrow_mut() = Some(document.clone());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }
}

/// A document whose active workspace holds the given `(id, url)` widgets
pub fn document_with_widgets(widgets: &[(&str, &str)]) -> WorkspacesDocument {
    let mut doc = WorkspacesDocument::new();
    doc.workspaces[0].widgets = widgets
        .iter()
        .map(|(id, url)| Widget {
            id: id.to_string(),
            title: id.to_string(),
            url: url.to_string(),
            position: Position::default(),
            width: 400.0,
            height: 300.0,
            custom_css: String::new(),
            extra: Default::default(),
        })
        .collect();
    doc
}

/// A coordinator wired to fakes plus the pool that runs its background tasks
pub struct Harness {
    pool: LocalPool,
    pub coordinator: Coordinator<FakeBrowser, FakeStore>,
}

impl Harness {
    pub fn new(store: FakeStore) -> Self {
        let pool = LocalPool::new();
        let browser = FakeBrowser::new(pool.spawner());
        Harness {
            pool,
            coordinator: Coordinator::new(browser, store, CoordinatorConfig::default()),
        }
    }

    pub fn browser(&self) -> &FakeBrowser {
        self.coordinator.browser()
    }

    pub fn store(&self) -> &FakeStore {
        self.coordinator.store()
    }

    pub fn run<F: Future>(&mut self, future: F) -> F::Output {
        self.pool.run_until(future)
    }

    /// Drain tasks spawned by the coordinator
    pub fn run_background(&mut self) {
        self.pool.run();
    }
}
