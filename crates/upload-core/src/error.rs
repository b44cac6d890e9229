//! Error types module
//!
//! Every failure an upload or delete call can produce is a variant of one of
//! the enums below. They are terminal for the call that produced them: nothing
//! in this workspace retries on its own.

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors like validation failures
    Debug,
    /// Misconfiguration an operator has to fix
    Warn,
    /// Backend or infrastructure failures
    Error,
}

/// Who is expected to act on an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The uploaded content or its metadata is at fault; show a validation message.
    UserInput,
    /// Settings or credentials are wrong or missing.
    Configuration,
    /// A transient backend failure; the caller may retry the whole upload.
    Infrastructure,
}

/// Metadata describing how an error should be presented to callers.
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g. "CORRUPTED_IMAGE")
    fn error_code(&self) -> &'static str;

    /// Classification used by callers to pick a user-facing message
    fn kind(&self) -> ErrorKind;

    /// Log level for this error
    fn log_level(&self) -> LogLevel {
        match self.kind() {
            ErrorKind::UserInput => LogLevel::Debug,
            ErrorKind::Configuration => LogLevel::Warn,
            ErrorKind::Infrastructure => LogLevel::Error,
        }
    }

    /// Whether re-running the full upload may succeed
    fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::Infrastructure
    }
}

/// Errors raised while reading settings into an [`UploadSettings`](crate::UploadSettings) snapshot.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for setting '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Invalid mime routing pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Errors raised by a processor stage.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Corrupted image: {0}")]
    CorruptedImage(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Processor configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Processor '{stage}' failed")]
    Other {
        stage: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Errors surfaced by the upload pipeline.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Corrupted image: {0}")]
    CorruptedImage(String),

    #[error("Encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("No adapter configured for mime type '{0}'")]
    NoAdapterForMime(String),

    #[error("Storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Empty file")]
    EmptyFile,
}

/// Errors surfaced by adapter deletion.
#[derive(Debug, thiserror::Error)]
pub enum DeleteError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("File cannot be deleted: {0}")]
    Forbidden(String),

    #[error("Delete transport failure: {0}")]
    TransportFailure(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<ConfigError> for UploadError {
    fn from(err: ConfigError) -> Self {
        UploadError::Configuration(err.to_string())
    }
}

impl From<ProcessingError> for UploadError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::CorruptedImage(msg) => UploadError::CorruptedImage(msg),
            ProcessingError::EncodingFailed(msg) => UploadError::EncodingFailed(msg),
            ProcessingError::Configuration(msg) => UploadError::Configuration(msg),
            ProcessingError::Io(e) => UploadError::ProcessingFailed(e.to_string()),
            ProcessingError::Other { stage, source } => {
                UploadError::ProcessingFailed(format!("{}: {:#}", stage, source))
            }
        }
    }
}

impl From<ConfigError> for DeleteError {
    fn from(err: ConfigError) -> Self {
        DeleteError::Configuration(err.to_string())
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            UploadError::CorruptedImage(_) => "CORRUPTED_IMAGE",
            UploadError::EncodingFailed(_) => "ENCODING_FAILED",
            UploadError::ProcessingFailed(_) => "PROCESSING_FAILED",
            UploadError::NoAdapterForMime(_) => "NO_ADAPTER_FOR_MIME",
            UploadError::StorageWriteFailed(_) => "STORAGE_WRITE_FAILED",
            UploadError::Configuration(_) => "CONFIGURATION_ERROR",
            UploadError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            UploadError::EmptyFile => "EMPTY_FILE",
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            UploadError::CorruptedImage(_)
            | UploadError::NoAdapterForMime(_)
            | UploadError::FileTooLarge { .. }
            | UploadError::EmptyFile => ErrorKind::UserInput,
            UploadError::Configuration(_) => ErrorKind::Configuration,
            UploadError::EncodingFailed(_)
            | UploadError::ProcessingFailed(_)
            | UploadError::StorageWriteFailed(_) => ErrorKind::Infrastructure,
        }
    }
}

impl ErrorMetadata for DeleteError {
    fn error_code(&self) -> &'static str {
        match self {
            DeleteError::NotFound(_) => "NOT_FOUND",
            DeleteError::Forbidden(_) => "DELETE_FORBIDDEN",
            DeleteError::TransportFailure(_) => "DELETE_TRANSPORT_FAILURE",
            DeleteError::Configuration(_) => "CONFIGURATION_ERROR",
        }
    }

    fn kind(&self) -> ErrorKind {
        match self {
            DeleteError::NotFound(_) | DeleteError::Forbidden(_) => ErrorKind::UserInput,
            DeleteError::Configuration(_) => ErrorKind::Configuration,
            DeleteError::TransportFailure(_) => ErrorKind::Infrastructure,
        }
    }
}
