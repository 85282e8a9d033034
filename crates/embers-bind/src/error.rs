use itertools::Itertools;

use crate::access::{
    AccessPair,
    CallMode,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("resolution error")]
    Resolution(#[from] ResolutionError),

    #[error("overload mismatch")]
    OverloadMismatch(#[from] OverloadMismatch),

    #[error("differentiability error")]
    Differentiability(#[from] DifferentiabilityError),

    #[error("writability error")]
    Writability(#[from] WritabilityError),

    #[error("generation error")]
    Generation(#[from] GenerationError),

    #[error("downstream compile error")]
    DownstreamCompile(#[from] DownstreamCompileError),

    #[error("call shape mismatch")]
    ShapeMismatch(#[from] CallShapeError),

    #[error("invalid mapping")]
    InvalidMapping(#[from] InvalidMapping),

    #[error("reflection error")]
    Reflection(#[from] ReflectionError),
}

impl Error {
    /// Dotted path of the bound variable the error originated from, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Resolution(e) => Some(&e.path),
            Self::Writability(e) => Some(&e.path),
            Self::Generation(e) => e.path(),
            Self::ShapeMismatch(CallShapeError::Mismatch { path, .. }) => Some(path),
            Self::InvalidMapping(e) => Some(&e.path),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("can't resolve '{path}': {host} can't be bound to {kernel}: {reason}")]
pub struct ResolutionError {
    pub path: String,
    pub host: String,
    pub kernel: String,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("overload #{overload}: {reason}")]
pub struct MismatchReason {
    pub overload: usize,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
#[error("no overload of '{function}' matches the call:\n{}\n\n{info}", list_reasons(.reasons))]
pub struct OverloadMismatch {
    pub function: String,
    pub reasons: Vec<MismatchReason>,
    pub info: String,
}

fn list_reasons(reasons: &[MismatchReason]) -> String {
    reasons.iter().map(|reason| format!("  {reason}")).join("\n")
}

#[derive(Debug, thiserror::Error)]
#[error("can't call '{function}' in {mode} mode: function is not differentiable")]
pub struct DifferentiabilityError {
    pub function: String,
    pub mode: CallMode,
}

#[derive(Debug, thiserror::Error)]
#[error("'{path}' is a non-writable {kind}, but the call writes to it ({access})")]
pub struct WritabilityError {
    pub path: String,
    pub kind: &'static str,
    pub access: AccessPair,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("fields of '{path}' don't match: host has {host:?}, kernel has {kernel:?}")]
    ChildMismatch {
        path: String,
        host: Vec<String>,
        kernel: Vec<String>,
    },

    #[error("no argument is bound to '{path}'")]
    UnboundParameter { path: String },

    #[error("'{path}' has no resolved vector type")]
    UnresolvedType { path: String },

    #[error("'{path}' has no vector mapping")]
    UnresolvedMapping { path: String },

    #[error("mapping {mapping:?} of '{path}' is invalid for a {call_dimensionality}-dimensional call")]
    MappingOutOfRange {
        path: String,
        mapping: Vec<usize>,
        call_dimensionality: usize,
    },

    #[error("a {kind} can't be accessed with {access} at '{path}'")]
    InvalidAccess {
        path: String,
        kind: &'static str,
        access: AccessPair,
    },

    #[error("'{path}' needs a derivative, but {ty} has none")]
    NoDerivativeType { path: String, ty: String },

    #[error("call dimensionality was already set")]
    CallDimensionalityAlreadySet,

    #[error("call dimensionality is not known yet")]
    MissingCallDimensionality,

    #[error("{0} calls are not supported")]
    UnsupportedCallMode(CallMode),

    #[error("failed to render kernel template")]
    Template(#[from] askama::Error),
}

impl GenerationError {
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::ChildMismatch { path, .. }
            | Self::UnboundParameter { path }
            | Self::UnresolvedType { path }
            | Self::UnresolvedMapping { path }
            | Self::MappingOutOfRange { path, .. }
            | Self::InvalidAccess { path, .. }
            | Self::NoDerivativeType { path, .. } => Some(path),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("kernel compilation for '{function}' failed")]
pub struct DownstreamCompileError {
    pub function: String,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

#[derive(Debug, thiserror::Error)]
pub enum CallShapeError {
    #[error("'{path}' has extent {extent} on call axis {axis}, but the call shape has {expected}")]
    Mismatch {
        path: String,
        axis: usize,
        extent: usize,
        expected: usize,
    },

    #[error("no argument determines the extent of call axis {axis}")]
    Unresolved { axis: usize },
}

#[derive(Debug, thiserror::Error)]
#[error("invalid mapping {mapping:?} for '{path}': {reason}")]
pub struct InvalidMapping {
    pub path: String,
    pub mapping: Vec<usize>,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ReflectionError {
    #[error("function '{name}' not found in module {module}")]
    FunctionNotFound { module: String, name: String },
}
