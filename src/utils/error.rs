use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Inventory file error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Inventory load error: {message}")]
    InventoryLoadError { message: String },

    #[error("Channel error on {channel}: {message}")]
    ChannelError { channel: String, message: String },

    #[error("Worker task failed: {0}")]
    TaskJoinError(#[from] tokio::task::JoinError),
}

impl ServiceError {
    pub fn user_friendly_message(&self) -> String {
        match self {
            ServiceError::IoError(e) => format!("File or channel operation failed: {}", e),
            ServiceError::InventoryLoadError { message } => {
                format!("Could not load the inventory: {}", message)
            }
            ServiceError::ChannelError { channel, .. } => {
                format!("Could not set up channel '{}'", channel)
            }
            other => other.to_string(),
        }
    }
}

/// Domain outcomes reported back to the requester. Never fatal to the service.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LendingError {
    #[error("title not found")]
    TitleNotFound,

    #[error("no available copy")]
    NoAvailableCopy,

    #[error("no loaned copy")]
    NoLoanedCopy,
}

/// Why an inbound record was discarded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("unknown operation kind '{0}'")]
    UnknownKind(String),

    #[error("field {field} is not an integer: '{value}'")]
    InvalidInteger { field: &'static str, value: String },

    #[error("title name is empty")]
    EmptyName,

    #[error("title name exceeds {max} bytes")]
    NameTooLong { max: usize },

    #[error("frame exceeds {max} bytes")]
    FrameTooLong { max: usize },

    #[error("frame is not valid UTF-8")]
    NotUtf8,
}

pub type Result<T> = std::result::Result<T, ServiceError>;
