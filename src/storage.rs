/// Read-modify-write helpers over the persisted workspace document
///
/// The coordinator's helpers log and swallow errors: the in-memory registry
/// stays authoritative and the next write tries again. Dashboard edits
/// return them to the caller.
use crate::error::StoreError;
use crate::host::WorkspaceStore;
use crate::workspace::WorkspacesDocument;
use log::{debug, error, info, warn};

/// Persist a widget's custom CSS. Does nothing when no document exists yet.
pub async fn save_widget_css<S: WorkspaceStore + ?Sized>(store: &S, widget_id: &str, css: &str) {
    let updated = update_document(store, |doc| doc.set_widget_css(widget_id, css)).await;
    match updated {
        Some(true) => info!("Saved CSS for widget {} in workspace data", widget_id),
        Some(false) => debug!("Widget {} not in workspace data, CSS not saved", widget_id),
        None => {}
    }
}

/// Persist the raw URL a widget's frame navigated to
pub async fn save_widget_url<S: WorkspaceStore + ?Sized>(store: &S, widget_id: &str, raw_url: &str) {
    let updated = update_document(store, |doc| {
        if let Some(widget) = doc.find_widget(widget_id) {
            if widget.url != raw_url {
                info!(
                    "Updating stored URL for widget {} from {:?} to {:?}",
                    widget_id, widget.url, raw_url
                );
            }
        }
        doc.set_widget_url(widget_id, raw_url)
    })
    .await;

    if updated == Some(false) {
        warn!("Widget {} not found in storage for URL update", widget_id);
    }
}

/// Saved custom CSS for a widget, if any and non-empty
pub async fn load_widget_css<S: WorkspaceStore + ?Sized>(store: &S, widget_id: &str) -> Option<String> {
    match store.load().await {
        Ok(Some(doc)) => doc
            .find_widget(widget_id)
            .map(|widget| widget.custom_css.clone())
            .filter(|css| !css.trim().is_empty()),
        Ok(None) => None,
        Err(e) => {
            error!("Error loading saved CSS for widget {}: {}", widget_id, e);
            None
        }
    }
}

/// The stored document after repair, or a fresh one when nothing is stored.
/// Fresh and repaired documents are written back.
pub async fn load_workspaces<S: WorkspaceStore + ?Sized>(store: &S) -> Result<WorkspacesDocument, StoreError> {
    let (mut doc, created) = match store.load().await? {
        Some(doc) => (doc, false),
        None => {
            info!("No workspace data found, creating the default workspace");
            (WorkspacesDocument::new(), true)
        }
    };

    if doc.repair() || created {
        store.save(&doc).await?;
    }
    Ok(doc)
}

/// Apply a dashboard edit, saving when `change` reports a modification.
/// Returns the document as it now stands.
pub async fn edit_workspaces<S, F>(store: &S, change: F) -> Result<WorkspacesDocument, StoreError>
where
    S: WorkspaceStore + ?Sized,
    F: FnOnce(&mut WorkspacesDocument) -> bool,
{
    let mut doc = load_workspaces(store).await?;
    if change(&mut doc) {
        store.save(&doc).await?;
    } else {
        debug!("Workspace edit changed nothing, not saving");
    }
    Ok(doc)
}

/// Load, apply `change`, and save only when it reports a modification.
/// Returns `None` when there was no document or a storage call failed.
async fn update_document<S, F>(store: &S, change: F) -> Option<bool>
where
    S: WorkspaceStore + ?Sized,
    F: FnOnce(&mut WorkspacesDocument) -> bool,
{
    let mut doc = match store.load().await {
        Ok(Some(doc)) => doc,
        Ok(None) => return None,
        Err(e) => {
            error!("Error reading workspace data: {}", e);
            return None;
        }
    };

    if !change(&mut doc) {
        return Some(false);
    }

    match store.save(&doc).await {
        Ok(()) => Some(true),
        Err(e) => {
            error!("Error writing workspace data: {}", e);
            None
        }
    }
}
