use std::fmt;

use super::artifact::ArtifactHandle;

/// Compile status shown to the editor surface.
///
/// ```text
/// idle | done | error ──compile()──► compiling ──success──► done
///                                        └──────failure──► error
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CompileStatus {
    #[default]
    Idle,
    Compiling,
    Done,
    Error,
}

impl CompileStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Compiling => "compiling",
            Self::Done => "done",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for CompileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one `compile()` call resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    pub success: bool,
    /// `Idle` for a superseded request, else the status it produced.
    pub status: CompileStatus,
    pub artifact: Option<ArtifactHandle>,
    pub diagnostics: Vec<String>,
    pub message: Option<String>,
}

impl CompileOutcome {
    /// Outcome of a request superseded by a newer compile.
    pub fn stale() -> Self {
        Self {
            success: false,
            status: CompileStatus::Idle,
            artifact: None,
            diagnostics: Vec::new(),
            message: None,
        }
    }

    pub(super) fn done(artifact: ArtifactHandle, diagnostics: Vec<String>) -> Self {
        Self {
            success: true,
            status: CompileStatus::Done,
            artifact: Some(artifact),
            diagnostics,
            message: None,
        }
    }

    pub(super) fn failed(message: String, diagnostics: Vec<String>) -> Self {
        Self {
            success: false,
            status: CompileStatus::Error,
            artifact: None,
            diagnostics,
            message: Some(message),
        }
    }

    pub fn is_stale(&self) -> bool {
        !self.success && self.status == CompileStatus::Idle
    }
}
