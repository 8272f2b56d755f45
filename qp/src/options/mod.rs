//! Customization options
//!
//! - [`schema`]: the option list the analyzer returns, validated at the boundary
//! - [`selection`]: what the user picked for each option
//! - [`resolve`]: selections rendered as instruction fragments

mod resolve;
pub mod schema;
mod selection;

pub use resolve::{NATURAL_STYLE, resolve};
pub use schema::{CustomOption, NOT_SPECIFIED, OTHER, OptionSchema, OptionValue, SchemaError, keys};
pub use selection::{OptionSelectionMap, SelectedValue};
