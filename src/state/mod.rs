//! State Management Module
//!
//! Provides the project schema, fit controls, persistence, undo/redo and
//! the open project session.

pub mod controls;
pub mod folder;
pub mod project;
pub mod session;
pub mod undo;

pub use controls::Controls;
pub use project::Project;
pub use session::ProjectSession;
pub use undo::UndoManager;
