//! Diagnostic side-channel for skipped and dropped edits.
//!
//! Nothing the reconciler decides not to write is lost silently: every skip,
//! rewrite or failure is reported to an injected [`DiagnosticSink`].

use std::fmt;

/// What happened to a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// The planner marked the change as skip
    Skipped,
    /// The remote value is a known platform default
    DefaultSuppressed,
    /// A remove targets a field that is not in any source file
    DroppedNoProvenance,
    /// A replace of a field missing from source became an add
    ReclassifiedAsAdd,
    /// A cleared field is written back with an explicit sentinel
    ResetValue,
    /// An added element took the position of a removed one
    SlotReused,
    /// The field path could not be resolved or encoded
    ResolutionFailed,
    /// No file could be found for the resource
    LocationFailed,
    /// Every patch candidate failed for an edit
    EditDropped,
}

impl DiagnosticKind {
    pub fn level(self) -> log::Level {
        match self {
            Self::Skipped
            | Self::DefaultSuppressed
            | Self::ReclassifiedAsAdd
            | Self::ResetValue
            | Self::SlotReused => log::Level::Debug,
            Self::DroppedNoProvenance => log::Level::Info,
            Self::ResolutionFailed | Self::EditDropped => log::Level::Warn,
            Self::LocationFailed => log::Level::Error,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::DefaultSuppressed => "default-suppressed",
            Self::DroppedNoProvenance => "dropped-no-provenance",
            Self::ReclassifiedAsAdd => "reclassified-as-add",
            Self::ResetValue => "reset-value",
            Self::SlotReused => "slot-reused",
            Self::ResolutionFailed => "resolution-failed",
            Self::LocationFailed => "location-failed",
            Self::EditDropped => "edit-dropped",
        }
    }
}

/// One reported decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub resource: String,
    pub field: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            resource: resource.into(),
            field: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn level(&self) -> log::Level {
        self.kind.level()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}.{}: {}", self.resource, field, self.message),
            None => write!(f, "{}: {}", self.resource, self.message),
        }
    }
}

/// Receiver of diagnostics.
pub trait DiagnosticSink {
    fn emit(&mut self, diagnostic: Diagnostic);
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn emit(&mut self, diagnostic: Diagnostic) {
        (**self).emit(diagnostic);
    }
}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        log::log!(
            diagnostic.level(),
            "[{}] {}",
            diagnostic.kind.as_str(),
            diagnostic
        );
    }
}

/// Discards diagnostics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDiagnostics;

impl DiagnosticSink for NoDiagnostics {
    fn emit(&mut self, _diagnostic: Diagnostic) {}
}

/// Keeps diagnostics in memory, in emission order.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    diagnostics: Vec<Diagnostic>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn of_kind(&self, kind: DiagnosticKind) -> Vec<&Diagnostic> {
        self.diagnostics.iter().filter(|d| d.kind == kind).collect()
    }

    /// Number of diagnostics at warning level or above.
    pub fn warnings(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.level() <= log::Level::Warn)
            .count()
    }

    pub fn into_inner(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}
