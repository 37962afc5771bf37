//! System prompt management for the RMP chat service.
//!
//! This crate provides:
//! - YAML-based prompt definitions
//! - A built-in "Rate My Professor" system prompt
//! - Handlebars template rendering

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::render_system_prompt;
pub use loader::{builtin_prompt, load_prompt, load_system_prompt, DEFAULT_PROMPT_ID};
pub use types::{PromptDefinition, SystemPrompt};
