//! Configuration loading: the per-workspace upload document (`dw.json`) and
//! layered process settings (`settings.toml`).

pub mod paths;
pub mod settings;
pub mod upload;
pub mod validate;

mod settings_merge;

pub use settings::{DEFAULT_IGNORE_LIST, Settings, UploadSettings};
pub use upload::{UPLOAD_CONFIG_FILE, UploadConfig};
pub use validate::{compile_ignore_list, validate_settings};
