/// Workspace document shared with the dashboard through chrome.storage.local
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

const DEFAULT_WORKSPACE_NAME: &str = "Default";
const DEFAULT_POSITION: Position = Position { x: 10.0, y: 10.0 };
const DEFAULT_WIDTH: f64 = 400.0;
const DEFAULT_HEIGHT: f64 = 300.0;

/// Root storage structure under the `workspaces` key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspacesDocument {
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
    #[serde(default)]
    pub active_workspace: Option<String>,
    /// Fields written by other versions of the dashboard, kept on write-back
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub widgets: Vec<Widget>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Default for Position {
    fn default() -> Self {
        DEFAULT_POSITION
    }
}

/// A widget record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Widget {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub position: Position,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default)]
    pub custom_css: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_width() -> f64 {
    DEFAULT_WIDTH
}

fn default_height() -> f64 {
    DEFAULT_HEIGHT
}

/// Data for a widget the user is adding
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewWidget {
    pub title: String,
    pub url: String,
    pub custom_css: Option<String>,
    pub position: Option<Position>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// An imported file: one workspace or a list of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WorkspaceImport {
    Many(Vec<Workspace>),
    One(Workspace),
}

impl WorkspaceImport {
    pub fn into_workspaces(self) -> Vec<Workspace> {
        match self {
            WorkspaceImport::Many(workspaces) => workspaces,
            WorkspaceImport::One(workspace) => vec![workspace],
        }
    }
}

/// A workspace ready to be downloaded
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceExport {
    pub file_name: String,
    pub contents: String,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl Workspace {
    pub fn new(name: String) -> Workspace {
        Workspace {
            id: new_id(),
            name,
            widgets: Vec::new(),
            extra: Map::new(),
        }
    }

    /// Download name: `workspace-<lowercased name, whitespace runs as '-'>.json`
    pub fn export_file_name(&self) -> String {
        let slug = self
            .name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        format!("workspace-{}.json", slug)
    }

    pub fn export(&self) -> Result<WorkspaceExport, serde_json::Error> {
        Ok(WorkspaceExport {
            file_name: self.export_file_name(),
            contents: serde_json::to_string_pretty(self)?,
        })
    }
}

impl WorkspacesDocument {
    /// A fresh document with a single active "Default" workspace
    pub fn new() -> Self {
        let workspace = Workspace::new(DEFAULT_WORKSPACE_NAME.to_string());
        WorkspacesDocument {
            active_workspace: Some(workspace.id.clone()),
            workspaces: vec![workspace],
            extra: Map::new(),
        }
    }

    /// Fix up a loaded document. Returns true when it changed and should be saved.
    pub fn repair(&mut self) -> bool {
        if self.workspaces.is_empty() {
            let workspace = Workspace::new(DEFAULT_WORKSPACE_NAME.to_string());
            self.active_workspace = Some(workspace.id.clone());
            self.workspaces.push(workspace);
            return true;
        }

        let active_is_valid = self
            .active_workspace
            .as_deref()
            .is_some_and(|id| self.workspaces.iter().any(|ws| ws.id == id));

        if active_is_valid {
            false
        } else {
            self.active_workspace = Some(self.workspaces[0].id.clone());
            true
        }
    }

    pub fn active_workspace(&self) -> Option<&Workspace> {
        let active_id = self.active_workspace.as_deref()?;
        self.workspaces.iter().find(|ws| ws.id == active_id)
    }

    fn active_workspace_mut(&mut self) -> Option<&mut Workspace> {
        let active_id = self.active_workspace.clone()?;
        self.workspaces.iter_mut().find(|ws| ws.id == active_id)
    }

    /// Find a widget in any workspace
    pub fn find_widget(&self, widget_id: &str) -> Option<&Widget> {
        self.workspaces
            .iter()
            .flat_map(|ws| ws.widgets.iter())
            .find(|w| w.id == widget_id)
    }

    fn widgets_mut<'a>(&'a mut self, widget_id: &'a str) -> impl Iterator<Item = &'a mut Widget> + 'a {
        self.workspaces
            .iter_mut()
            .flat_map(|ws| ws.widgets.iter_mut())
            .filter(move |w| w.id == widget_id)
    }

    /// Replace `customCss` on every widget with this id. Returns whether any matched.
    pub fn set_widget_css(&mut self, widget_id: &str, css: &str) -> bool {
        self.widgets_mut(widget_id)
            .map(|widget| widget.custom_css = css.to_string())
            .count()
            > 0
    }

    /// Replace `url` on every widget with this id. Returns whether any matched.
    pub fn set_widget_url(&mut self, widget_id: &str, url: &str) -> bool {
        self.widgets_mut(widget_id)
            .map(|widget| widget.url = url.to_string())
            .count()
            > 0
    }

    pub fn set_active_workspace(&mut self, workspace_id: &str) -> bool {
        if self.active_workspace.as_deref() == Some(workspace_id) {
            return false;
        }
        if !self.workspaces.iter().any(|ws| ws.id == workspace_id) {
            log::warn!("set_active_workspace: workspace {} not found", workspace_id);
            return false;
        }
        self.active_workspace = Some(workspace_id.to_string());
        true
    }

    /// Append a workspace; an empty name becomes `Workspace N`. Returns the new id.
    pub fn add_workspace(&mut self, name: &str) -> String {
        let name = if name.trim().is_empty() {
            format!("Workspace {}", self.workspaces.len() + 1)
        } else {
            name.to_string()
        };
        let workspace = Workspace::new(name);
        let id = workspace.id.clone();
        self.workspaces.push(workspace);
        id
    }

    /// Remove a workspace, never the last one
    pub fn remove_workspace(&mut self, workspace_id: &str) -> bool {
        if self.workspaces.len() <= 1 {
            log::warn!("remove_workspace: cannot remove the last workspace");
            return false;
        }

        let original_len = self.workspaces.len();
        self.workspaces.retain(|ws| ws.id != workspace_id);
        if self.workspaces.len() == original_len {
            return false;
        }

        if self.active_workspace.as_deref() == Some(workspace_id) {
            self.active_workspace = self.workspaces.first().map(|ws| ws.id.clone());
        }
        true
    }

    /// Rename with a trimmed name. Empty or unchanged names are no-ops.
    pub fn rename_workspace(&mut self, workspace_id: &str, new_name: &str) -> bool {
        let trimmed = new_name.trim();
        if trimmed.is_empty() {
            return false;
        }

        self.workspaces
            .iter_mut()
            .find(|ws| ws.id == workspace_id && ws.name != trimmed)
            .map(|ws| ws.name = trimmed.to_string())
            .is_some()
    }

    /// Add a widget to the active workspace. Returns the new widget id.
    pub fn add_widget(&mut self, data: NewWidget) -> Option<String> {
        let Some(workspace) = self.active_workspace_mut() else {
            log::error!("add_widget: no active workspace");
            return None;
        };

        let widget = Widget {
            id: new_id(),
            title: data.title,
            url: data.url,
            position: data.position.unwrap_or(DEFAULT_POSITION),
            width: data.width.unwrap_or(DEFAULT_WIDTH),
            height: data.height.unwrap_or(DEFAULT_HEIGHT),
            custom_css: data.custom_css.unwrap_or_default(),
            extra: Map::new(),
        };
        let id = widget.id.clone();
        workspace.widgets.push(widget);
        Some(id)
    }

    /// Remove a widget from the active workspace
    pub fn remove_widget(&mut self, widget_id: &str) -> bool {
        self.active_workspace_mut()
            .map(|ws| {
                let original_len = ws.widgets.len();
                ws.widgets.retain(|w| w.id != widget_id);
                ws.widgets.len() < original_len
            })
            .unwrap_or(false)
    }

    /// Replace a widget of the active workspace. False when missing or identical.
    pub fn update_widget(&mut self, updated: Widget) -> bool {
        let Some(workspace) = self.active_workspace_mut() else {
            return false;
        };

        match workspace.widgets.iter_mut().find(|w| w.id == updated.id) {
            Some(existing) if *existing != updated => {
                *existing = updated;
                true
            }
            _ => false,
        }
    }

    /// Append imported workspaces under fresh ids. Returns how many were added.
    pub fn import_workspaces(&mut self, imported: Vec<Workspace>) -> usize {
        let count = imported.len();
        self.workspaces.extend(imported.into_iter().map(|ws| Workspace {
            id: new_id(),
            widgets: ws
                .widgets
                .into_iter()
                .map(|w| Widget { id: new_id(), ..w })
                .collect(),
            ..ws
        }));
        count
    }
}

impl Default for WorkspacesDocument {
    fn default() -> Self {
        Self::new()
    }
}
