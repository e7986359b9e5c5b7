//! Undo/Redo System
//!
//! Snapshot-based history. Each action stores the project and controls
//! before and after the change, so undo and redo simply restore a snapshot.
//! The manager also remembers which point in the history was last saved,
//! which is how the session knows about unsaved changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RascalError, Result};
use crate::state::controls::Controls;
use crate::state::project::Project;

/// Default maximum number of undo levels to keep.
pub const DEFAULT_MAX_UNDO_LEVELS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Project fields replaced.
    EditProject,

    /// One control setting changed.
    EditControls,

    /// ORSO file imported.
    Import,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionType::EditProject => write!(f, "Edit Project"),
            ActionType::EditControls => write!(f, "Edit Controls"),
            ActionType::Import => write!(f, "Import"),
        }
    }
}

/// Project and controls at one point in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub project: Project,
    pub controls: Controls,
}

impl Snapshot {
    pub fn capture(project: &Project, controls: &Controls) -> Self {
        Self {
            project: project.clone(),
            controls: controls.clone(),
        }
    }

    fn restore(&self, project: &mut Project, controls: &mut Controls) {
        *project = self.project.clone();
        *controls = self.controls.clone();
    }
}

/// A single undoable action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndoAction {
    pub id: String,
    pub action_type: ActionType,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub state_before: Snapshot,
    pub state_after: Snapshot,
}

impl UndoAction {
    pub fn new(
        action_type: ActionType,
        description: impl Into<String>,
        state_before: Snapshot,
        state_after: Snapshot,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action_type,
            description: description.into(),
            timestamp: Utc::now(),
            state_before,
            state_after,
        }
    }
}

/// Manages undo/redo for a session.
#[derive(Debug, Clone)]
pub struct UndoManager {
    undo_stack: Vec<UndoAction>,
    redo_stack: Vec<UndoAction>,
    max_undo_levels: usize,

    /// Undo stack depth at the last save; `None` once that state is unreachable.
    clean_index: Option<usize>,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO_LEVELS)
    }
}

impl UndoManager {
    pub fn new(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_undo_levels: max_levels,
            clean_index: Some(0),
        }
    }

    /// Push a new action; clears the redo stack and trims old history.
    pub fn push(&mut self, action: UndoAction) {
        if let Some(clean) = self.clean_index {
            if clean > self.undo_stack.len() {
                // the saved state was on the redo stack
                self.clean_index = None;
            }
        }
        self.redo_stack.clear();
        self.undo_stack.push(action);
        self.trim_history();
    }

    /// Undo the last action, restoring the state before it.
    pub fn undo(&mut self, project: &mut Project, controls: &mut Controls) -> Result<UndoAction> {
        let action = self.undo_stack.pop().ok_or(RascalError::NothingToUndo)?;
        action.state_before.restore(project, controls);
        self.redo_stack.push(action.clone());
        Ok(action)
    }

    /// Redo the last undone action, restoring the state after it.
    pub fn redo(&mut self, project: &mut Project, controls: &mut Controls) -> Result<UndoAction> {
        let action = self.redo_stack.pop().ok_or(RascalError::NothingToRedo)?;
        action.state_after.restore(project, controls);
        self.undo_stack.push(action.clone());
        Ok(action)
    }

    fn trim_history(&mut self) {
        let excess = self.undo_stack.len().saturating_sub(self.max_undo_levels);
        if excess == 0 {
            return;
        }
        self.undo_stack.drain(..excess);
        self.clean_index = self.clean_index.and_then(|clean| clean.checked_sub(excess));
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn peek_undo(&self) -> Option<&UndoAction> {
        self.undo_stack.last()
    }

    pub fn peek_redo(&self) -> Option<&UndoAction> {
        self.redo_stack.last()
    }

    /// Mark the current state as saved.
    pub fn set_clean(&mut self) {
        self.clean_index = Some(self.undo_stack.len());
    }

    /// Whether the current state is the one last saved.
    pub fn is_clean(&self) -> bool {
        self.clean_index == Some(self.undo_stack.len())
    }

    /// Forget all history; the current state counts as clean.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.clean_index = Some(0);
    }

    /// Undo stack for display, most recent first.
    pub fn undo_stack_summary(&self) -> Vec<(String, ActionType, String)> {
        self.undo_stack
            .iter()
            .rev()
            .map(|a| (a.id.clone(), a.action_type, a.description.clone()))
            .collect()
    }
}
