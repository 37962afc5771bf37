//! Prompt loader for YAML prompt definitions.

use crate::types::PromptDefinition;
use rmp_core::{AppError, AppResult};
use std::path::Path;

/// ID of the built-in system prompt.
pub const DEFAULT_PROMPT_ID: &str = "rmp.chat.system";

const BUILTIN_SYSTEM_PROMPT: &str = include_str!("../prompts/rmp.chat.system.yml");

/// Load the built-in "Rate My Professor" system prompt.
pub fn builtin_prompt() -> AppResult<PromptDefinition> {
    let definition = parse_prompt(BUILTIN_SYSTEM_PROMPT, Path::new(DEFAULT_PROMPT_ID))?;
    validate_prompt(&definition)?;
    Ok(definition)
}

/// Load a prompt definition from a YAML file.
///
/// # Example
/// ```no_run
/// use rmp_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("prompts/system.yml"))?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(prompt_file: &Path) -> AppResult<PromptDefinition> {
    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition = parse_prompt(&contents, prompt_file)?;

    // Validate required fields
    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Load the configured system prompt, falling back to the built-in one.
pub fn load_system_prompt(path: Option<&Path>) -> AppResult<PromptDefinition> {
    match path {
        Some(path) => load_prompt(path),
        None => builtin_prompt(),
    }
}

fn parse_prompt(contents: &str, origin: &Path) -> AppResult<PromptDefinition> {
    serde_yaml::from_str(contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", origin, e))
    })
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    // Validate API version format (simple check)
    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
