//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for question analysis
//! and prompt optimization.
//!
//! Template loading chain:
//! 1. `{prompts.dir}/{name}.pmt` (user override)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax with HTML escaping disabled.

pub mod embedded;
mod loader;

pub use loader::{PromptLoader, TemplateSource};
