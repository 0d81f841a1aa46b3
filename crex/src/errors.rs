use crextables::Fxy;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Input is not a {expected} message")]
    NotThisFormat { expected: &'static str },

    #[error("Premature end of message at byte {offset}")]
    PrematureEndOfMessage { offset: usize },

    #[error("Malformed value {text:?} for {fxy} at byte {offset}")]
    MalformedValue {
        fxy: Fxy,
        text: String,
        offset: usize,
    },

    #[error("Check digit mismatch at byte {offset}: expected {expected}, found {found:?}")]
    CheckDigitMismatch {
        expected: u8,
        found: char,
        offset: usize,
    },

    #[error("Descriptor {fxy} not found in the loaded tables (byte {offset})")]
    UnknownDescriptor { fxy: Fxy, offset: usize },

    #[error("Modifier descriptor {fxy} is not supported (byte {offset})")]
    UnsupportedModifier { fxy: Fxy, offset: usize },

    #[error(
        "Replication needs {requested} descriptors but only {available} remain (byte {offset})"
    )]
    InsufficientOpcodes {
        requested: usize,
        available: usize,
        offset: usize,
    },

    #[error("Descriptor list is empty")]
    EmptyList,

    #[error("Malformed framing at byte {offset}: {reason}")]
    MalformedFraming { offset: usize, reason: String },

    #[error("Message decodes to more than {limit} variables (byte {offset})")]
    TooManyVariables { limit: usize, offset: usize },

    #[error("Replication nested deeper than {limit} levels (byte {offset})")]
    NestingTooDeep { limit: usize, offset: usize },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Unsupported BUFR edition: {0}")]
    UnsupportedEdition(u8),

    #[error("Table not found: {0}")]
    TableNotFound(#[from] anyhow::Error),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config Error: {0}")]
    Config(#[from] toml::de::Error),
}

impl Error {
    /// Byte offset into the raw message at which the error was detected.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Error::PrematureEndOfMessage { offset }
            | Error::MalformedValue { offset, .. }
            | Error::CheckDigitMismatch { offset, .. }
            | Error::UnknownDescriptor { offset, .. }
            | Error::UnsupportedModifier { offset, .. }
            | Error::InsufficientOpcodes { offset, .. }
            | Error::MalformedFraming { offset, .. }
            | Error::TooManyVariables { offset, .. }
            | Error::NestingTooDeep { offset, .. } => Some(*offset),
            _ => None,
        }
    }

    /// Stamps errors raised away from the raw cursor (descriptor lists,
    /// table lookups) with the cursor position.
    pub(crate) fn at(self, position: usize) -> Self {
        match self {
            Error::UnknownDescriptor { fxy, .. } => Error::UnknownDescriptor {
                fxy,
                offset: position,
            },
            Error::InsufficientOpcodes {
                requested,
                available,
                ..
            } => Error::InsufficientOpcodes {
                requested,
                available,
                offset: position,
            },
            other => other,
        }
    }

    pub(crate) fn premature(offset: usize) -> Self {
        Error::PrematureEndOfMessage { offset }
    }

    pub(crate) fn framing(offset: usize, reason: impl Into<String>) -> Self {
        Error::MalformedFraming {
            offset,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
