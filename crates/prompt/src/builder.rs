//! Prompt builder for rendering system prompt templates.

use crate::types::{PromptDefinition, SystemPrompt};
use rmp_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Render the system prompt for a retrieval of `top_k` matches.
///
/// The template sees `topK` as a variable, so the instruction always asks
/// for as many recommendations as the index returns.
///
/// # Example
/// ```no_run
/// use rmp_prompt::{builtin_prompt, render_system_prompt};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = render_system_prompt(&builtin_prompt()?, 3)?;
/// println!("{}", prompt.text);
/// # Ok(())
/// # }
/// ```
pub fn render_system_prompt(definition: &PromptDefinition, top_k: usize) -> AppResult<SystemPrompt> {
    tracing::debug!("Rendering system prompt: {}", definition.id);

    let mut variables = HashMap::new();
    variables.insert("topK".to_string(), top_k.to_string());

    let text = render_template(&definition.template, &variables)?;

    Ok(SystemPrompt {
        source_prompt_id: definition.id.clone(),
        text: text.trim_end().to_string(),
    })
}

/// Render a Handlebars template with variables.
fn render_template(template: &str, variables: &HashMap<String, String>) -> AppResult<String> {
    let mut handlebars = Handlebars::new();

    // Disable HTML escaping for plain text
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("prompt", template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let rendered = handlebars
        .render("prompt", &variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))?;

    Ok(rendered)
}
