use crate::dataref::DataTypes;
use thiserror::Error;

/// Coarse classification of a [`BridgeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    NotWritable,
    TypeUnsupported,
    InvalidArgument,
    ResourceExhausted,
}

/// Errors produced by bridge operations.
///
/// None of these ever reach a script as an exception; the binding layer
/// turns each one into the documented sentinel return value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("dataref '{path}' not found")]
    DataRefNotFound { path: String },

    #[error("object '{path}' is not loaded")]
    ObjectNotLoaded { path: String },

    #[error("object '{path}' could not be loaded by the host")]
    ObjectLoadFailed { path: String },

    #[error("unknown {kind} handle {handle}")]
    UnknownHandle { kind: &'static str, handle: String },

    #[error("dataref '{path}' is read-only")]
    NotWritable { path: String },

    #[error("dataref '{path}' does not support {requested:?} (supports {supported:?})")]
    TypeUnsupported {
        path: String,
        requested: DataTypes,
        supported: DataTypes,
    },

    #[error("invalid argument '{name}': {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("{kind} limit of {limit} live handles reached")]
    HandleLimit { kind: &'static str, limit: usize },

    #[error("host failed to allocate a {kind}")]
    HostAllocation { kind: &'static str },
}

impl BridgeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::DataRefNotFound { .. }
            | Self::ObjectNotLoaded { .. }
            | Self::ObjectLoadFailed { .. }
            | Self::UnknownHandle { .. } => ErrorKind::NotFound,
            Self::NotWritable { .. } => ErrorKind::NotWritable,
            Self::TypeUnsupported { .. } => ErrorKind::TypeUnsupported,
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::HandleLimit { .. } | Self::HostAllocation { .. } => ErrorKind::ResourceExhausted,
        }
    }

    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
