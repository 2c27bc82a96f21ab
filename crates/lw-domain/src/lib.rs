#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod file_data;
pub mod project_key;
pub mod properties;
pub mod timestamp;

pub use file_data::{ChangesetType, Features, FileData, FileItem, FileMapping, UserInfo};
pub use project_key::ProjectKey;
pub use properties::{PropertyMap, PropertyParseError};
pub use timestamp::{
    format_legacy_date, from_millis, parse_legacy_date, to_millis, truncate_to_millis,
};
