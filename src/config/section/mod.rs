//! Configuration sections.
//!
//! ```toml
//! [compile]
//! debounce_ms = 300           # Quiet period before a change is compiled
//! entry = "main.typ"          # Virtual path of the primary source
//!
//! [renderer]
//! command = "typst"           # Executable, looked up on PATH
//! format = "pdf"              # pdf | png | svg
//! ignore_system_fonts = false
//!
//! [fonts]
//! base = []                   # Font directories loaded up front
//! extended = []               # Added once a document needs wider glyph coverage
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::renderer::OutputFormat;

/// `[compile]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileSection {
    /// Coalescer delay in milliseconds.
    pub debounce_ms: u64,

    /// Virtual path the edited source is registered under.
    pub entry: String,
}

impl Default for CompileSection {
    fn default() -> Self {
        Self {
            debounce_ms: 300,
            entry: "main.typ".into(),
        }
    }
}

/// `[renderer]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSection {
    pub command: String,
    pub format: OutputFormat,
    pub ignore_system_fonts: bool,
}

impl Default for RendererSection {
    fn default() -> Self {
        Self {
            command: "typst".into(),
            format: OutputFormat::Pdf,
            ignore_system_fonts: false,
        }
    }
}

/// `[fonts]` section. Relative directories resolve against the config root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontsSection {
    pub base: Vec<PathBuf>,
    pub extended: Vec<PathBuf>,
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use crate::renderer::OutputFormat;
    use std::path::PathBuf;

    #[test]
    fn test_section_defaults() {
        let config = test_parse_config("");

        assert_eq!(config.compile.debounce_ms, 300);
        assert_eq!(config.compile.entry, "main.typ");
        assert_eq!(config.renderer.command, "typst");
        assert_eq!(config.renderer.format, OutputFormat::Pdf);
        assert!(!config.renderer.ignore_system_fonts);
        assert!(config.fonts.base.is_empty());
        assert!(config.fonts.extended.is_empty());
    }

    #[test]
    fn test_sections_parse() {
        let config = test_parse_config(
            r#"
[compile]
debounce_ms = 150
entry = "thesis.typ"

[renderer]
command = "/opt/typst/bin/typst"
format = "svg"
ignore_system_fonts = true

[fonts]
base = ["fonts"]
extended = ["fonts/cjk", "fonts/emoji"]
"#,
        );

        assert_eq!(config.compile.debounce_ms, 150);
        assert_eq!(config.compile.entry, "thesis.typ");
        assert_eq!(config.renderer.command, "/opt/typst/bin/typst");
        assert_eq!(config.renderer.format, OutputFormat::Svg);
        assert!(config.renderer.ignore_system_fonts);
        assert_eq!(config.fonts.base, vec![PathBuf::from("fonts")]);
        assert_eq!(config.fonts.extended.len(), 2);
    }

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config = test_parse_config("[compile]\ndebounce_ms = 50");
        assert_eq!(config.compile.debounce_ms, 50);
        assert_eq!(config.compile.entry, "main.typ");
    }
}
