use std::path::{Path, PathBuf};
use thiserror::Error;

/// Core error type for Avro read/write operations
#[derive(Error, Debug)]
pub enum AvroFormatError {
    /// IO errors from file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by the Avro library (schema parsing, encoding, decoding)
    #[error("Avro error: {0}")]
    Avro(#[from] apache_avro::Error),

    /// JSON errors from schema or configuration documents
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Date/time arithmetic or formatting errors
    #[error("Temporal error: {0}")]
    Temporal(#[from] jiff::Error),

    /// Schema-related errors
    #[error("Schema error: {0}")]
    Schema(String),

    /// Type conversion errors
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Invalid argument errors
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed or unusable field path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A path names a record field the schema does not have
    #[error("Field {0} does not seem to exist in the schema!")]
    FieldNotFound(String),

    /// Host or Avro type that cannot be handled
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// Union that is not a two-branch `[null, T]` union
    #[error("Unsupported union: {0}")]
    UnsupportedUnion(String),

    /// A row could not be appended to the container file
    #[error("Append write failed for field '{field}': {message}")]
    AppendWrite { field: String, message: String },

    /// Input or schema file does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Target file exists and overwriting is disabled
    #[error("File already exists: {}", .0.display())]
    FileExists(PathBuf),

    /// Neither explicit fields nor a usable schema were provided
    #[error("No field paths defined")]
    NoFieldsDefined,

    /// Unsupported operation errors
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Internal errors that shouldn't happen
    #[error("Internal error: {0}")]
    Internal(String),

    /// Number parsing errors
    #[error("Parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    /// Float parsing errors
    #[error("Parse float error: {0}")]
    ParseFloat(#[from] std::num::ParseFloatError),
}

/// Result type alias for Avro format operations
pub type Result<T> = std::result::Result<T, AvroFormatError>;

impl AvroFormatError {
    /// Create a new schema error
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        AvroFormatError::Schema(msg.into())
    }

    /// Create a new conversion error
    pub fn conversion<S: Into<String>>(msg: S) -> Self {
        AvroFormatError::Conversion(msg.into())
    }

    /// Create a new invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        AvroFormatError::InvalidArgument(msg.into())
    }

    /// Create a new invalid path error
    pub fn invalid_path<S: Into<String>>(msg: S) -> Self {
        AvroFormatError::InvalidPath(msg.into())
    }

    /// Create a new unsupported type error
    pub fn unsupported_type<S: Into<String>>(msg: S) -> Self {
        AvroFormatError::UnsupportedType(msg.into())
    }

    /// Create a new unsupported operation error
    pub fn unsupported<S: Into<String>>(msg: S) -> Self {
        AvroFormatError::Unsupported(msg.into())
    }

    /// Create a new append-write error for the named field
    pub fn append_write<F: Into<String>, S: Into<String>>(field: F, msg: S) -> Self {
        AvroFormatError::AppendWrite {
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        AvroFormatError::Internal(msg.into())
    }

    /// Classify a failure to open `path` for reading
    pub fn open_failed(path: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AvroFormatError::FileNotFound(path.to_path_buf()),
            _ => AvroFormatError::Io(err),
        }
    }
}
