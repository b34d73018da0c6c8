use thiserror::Error;

#[derive(Debug, Error)]
pub enum IfcError {
    #[error("not an IFC-SPF file: {0}")]
    NotStepFile(String),

    #[error("unsupported IFC container: {0} (only IFC-SPF text files are accepted)")]
    UnsupportedFormat(&'static str),

    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("no {0} entity found in model")]
    EntityNotFound(String),

    #[error("#{id} has no attribute at position {index}")]
    MissingAttribute { id: u64, index: usize },

    #[error("#{id} attribute {index} is not a string: {found}")]
    NotAString { id: u64, index: usize, found: String },

    #[error("invalid string literal: {0}")]
    InvalidString(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IfcError>;
