//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Quick analysis: persona, method and key points only
pub const ANALYSIS_QUICK: &str = include_str!("../../prompts/analysis-quick.pmt");

/// Detailed analysis: adds the customization option schema
pub const ANALYSIS_DETAILED: &str = include_str!("../../prompts/analysis-detailed.pmt");

/// Final prompt optimization
pub const OPTIMIZE: &str = include_str!("../../prompts/optimize.pmt");

/// Names of all embedded templates
pub const NAMES: [&str; 3] = ["analysis-quick", "analysis-detailed", "optimize"];

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "analysis-quick" => Some(ANALYSIS_QUICK),
        "analysis-detailed" => Some(ANALYSIS_DETAILED),
        "optimize" => Some(OPTIMIZE),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_name_is_embedded() {
        for name in NAMES {
            assert!(get_embedded(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn test_get_embedded_detailed() {
        let detailed = get_embedded("analysis-detailed").unwrap();
        assert!(detailed.contains("{{question}}"));
        assert!(detailed.contains("logic_structure"));
        assert!(detailed.contains("{{#if academic}}"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("nonexistent").is_none());
    }
}
