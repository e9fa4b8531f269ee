#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("No workspace folders with the 'file' scheme")]
    NoWorkspaceFolders,

    #[error("Invalid ignore pattern '{pattern}': {reason}")]
    InvalidIgnorePattern { pattern: String, reason: String },

    #[error("Sandbox target not available: {0}")]
    TargetUnavailable(String),

    #[error("Refusing to touch remote entry '{0}': not a plain cartridge name")]
    UnsafeRemoteName(String),

    #[error("Invalid code version '{0}': must be a single directory name")]
    UnsafeCodeVersion(String),

    #[error("Unsupported workspace folder scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("Invalid cartridge resolution '{0}': expected 'remove' or 'leave'")]
    InvalidResolution(String),
}
