pub mod assets;
pub mod cli;
pub mod config;
pub mod editor;
pub mod entity;
pub mod events;
pub mod factory;
pub mod gizmo;
pub mod graph;
pub mod history;
pub mod project;
pub mod scene;
pub mod selection;
pub mod skeleton;
pub mod transform;

pub use editor::{EditorContext, GenerationStep, LoadReport};
pub use project::ProjectManager;
