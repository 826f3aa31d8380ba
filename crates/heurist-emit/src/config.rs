use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    pub use_colors: bool,
    pub indent_style: IndentStyle,
    pub verbosity: VerbosityLevel,
    /// Prefix reconstructed source lines with their number.
    pub line_numbers: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            use_colors: true,
            indent_style: IndentStyle::Spaces(2),
            verbosity: VerbosityLevel::Normal,
            line_numbers: false,
        }
    }
}

impl EmitterConfig {
    pub fn plain() -> Self {
        Self {
            use_colors: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndentStyle {
    Spaces(usize),
    Tabs,
}

impl IndentStyle {
    pub fn unit(&self) -> String {
        match self {
            IndentStyle::Spaces(n) => " ".repeat(*n),
            IndentStyle::Tabs => "\t".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VerbosityLevel {
    /// Status line only.
    Quiet,
    Normal,
    /// Findings plus token composition and the deobfuscated source.
    Verbose,
}

impl VerbosityLevel {
    pub fn should_print_findings(&self) -> bool {
        *self >= VerbosityLevel::Normal
    }

    pub fn should_print_source(&self) -> bool {
        *self >= VerbosityLevel::Verbose
    }

    pub fn should_print_composition(&self) -> bool {
        *self >= VerbosityLevel::Verbose
    }
}
