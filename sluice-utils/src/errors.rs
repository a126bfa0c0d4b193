//! Errors surfaced during elaboration and emission.

/// Convenience alias for elaboration results.
pub type SluiceResult<T> = Result<T, Error>;

/// Errors generated by the library. Every error surfaces synchronously to
/// the caller of the triggering operation; there is no rollback, and prior
/// successful calls on the same pipeline remain usable.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An expression form has no lowering rule in the pipeline visitor.
    #[error("unsupported expression node: {0}")]
    UnsupportedNode(String),

    /// A history lookup was requested with a negative offset.
    #[error("history offset must be non-negative, got {0}")]
    InvalidIndex(i64),

    /// The constructed netlist is inconsistent: duplicate signal names,
    /// continuous assignment to a register, and the like.
    #[error("malformed structure: {0}")]
    MalformedStructure(String),

    /// Failure while writing generated output.
    #[error("write error: {0}")]
    WriteError(String),
}

impl Error {
    pub fn unsupported_node<S: ToString>(msg: S) -> Self {
        Error::UnsupportedNode(msg.to_string())
    }

    pub fn malformed_structure<S: ToString>(msg: S) -> Self {
        Error::MalformedStructure(msg.to_string())
    }

    pub fn write_error<S: ToString>(msg: S) -> Self {
        Error::WriteError(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::WriteError(err.to_string())
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Error::WriteError(err.to_string())
    }
}
