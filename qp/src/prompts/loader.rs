//! Prompt Loader
//!
//! Loads prompt templates from the override directory or falls back to
//! embedded defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use tracing::{debug, info};

use super::embedded;

/// Where a template was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    Override(PathBuf),
    Embedded,
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateSource::Override(path) => write!(f, "{}", path.display()),
            TemplateSource::Embedded => write!(f, "embedded"),
        }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// User override directory (e.g., `~/.config/questionplus/prompts/`)
    user_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a loader that checks `user_dir` before the embedded defaults
    ///
    /// A directory that doesn't exist is ignored.
    pub fn new(user_dir: Option<impl AsRef<Path>>) -> Self {
        let user_dir = user_dir.map(|d| d.as_ref().to_path_buf()).filter(|d| d.exists());
        debug!(?user_dir, "PromptLoader::new: called");
        Self {
            hbs: Self::engine(),
            user_dir,
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        debug!("PromptLoader::embedded_only: called");
        Self {
            hbs: Self::engine(),
            user_dir: None,
        }
    }

    fn engine() -> Handlebars<'static> {
        let mut hbs = Handlebars::new();
        // Prompts are plain text; `<` and `&` must pass through untouched
        hbs.register_escape_fn(handlebars::no_escape);
        hbs
    }

    fn override_path(&self, name: &str) -> Option<PathBuf> {
        self.user_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.pmt", name)))
            .filter(|path| path.exists())
    }

    /// Where `name` would be loaded from, if anywhere
    pub fn source(&self, name: &str) -> Option<TemplateSource> {
        if let Some(path) = self.override_path(name) {
            return Some(TemplateSource::Override(path));
        }
        embedded::get_embedded(name).map(|_| TemplateSource::Embedded)
    }

    /// Every known template with where it resolves from
    pub fn template_sources(&self) -> Vec<(&'static str, TemplateSource)> {
        embedded::NAMES
            .iter()
            .map(|name| (*name, self.source(name).unwrap_or(TemplateSource::Embedded)))
            .collect()
    }

    /// Load a template by name
    ///
    /// Checks in order:
    /// 1. User override: `{user_dir}/{name}.pmt`
    /// 2. Embedded fallback
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(path) = self.override_path(name) {
            debug!(?path, "PromptLoader::load_template: found in user override");
            return std::fs::read_to_string(&path)
                .map_err(|e| eyre!("Failed to read user prompt {}: {}", path.display(), e));
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: found in embedded");
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a template with the given context
    pub fn render<C: Serialize>(&self, template_name: &str, context: &C) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;
        info!("Rendering template '{}'", template_name);

        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }
}
