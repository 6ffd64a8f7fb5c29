//! Identifier validation and path helpers for save documents

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Why an owner or save identifier was rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdError {
    #[error("{what} cannot be empty")]
    Empty { what: &'static str },

    #[error("{what} is too long (maximum {max} characters)")]
    TooLong { what: &'static str, max: usize },

    #[error("{what} cannot start or end with whitespace")]
    InvalidWhitespace { what: &'static str },

    #[error("{what} contains path separators (/ or \\)")]
    PathTraversal { what: &'static str },

    #[error("{what} contains control characters: {chars}")]
    ControlCharacters { what: &'static str, chars: String },

    #[error("{what} is a reserved name")]
    Reserved { what: &'static str },

    #[error("file size exceeds limit ({limit} bytes)")]
    FileSizeExceeded { limit: u64 },

    #[error("invalid JSON document: {reason}")]
    InvalidFormat { reason: String },
}

/// Limits applied to one kind of identifier.
#[derive(Debug, Clone)]
pub struct IdRules {
    pub what: &'static str,
    pub max_length: usize,
}

impl IdRules {
    pub fn owner() -> Self {
        IdRules {
            what: "owner id",
            max_length: 64,
        }
    }

    pub fn save() -> Self {
        IdRules {
            what: "save id",
            max_length: 64,
        }
    }
}

/// Names that map onto special files or directories on some platforms.
fn reserved_names() -> HashSet<&'static str> {
    [
        ".", "..", "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6",
        "com7", "com8", "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8",
        "lpt9",
    ]
    .iter()
    .copied()
    .collect()
}

/// Check an identifier against `rules`. Any printable text is accepted; the
/// on-disk name is always percent-encoded by [`safe_filename`].
pub fn validate_id(id: &str, rules: &IdRules) -> Result<String, IdError> {
    let what = rules.what;
    if id.is_empty() {
        return Err(IdError::Empty { what });
    }
    if id.trim() != id {
        return Err(IdError::InvalidWhitespace { what });
    }
    if id.chars().count() > rules.max_length {
        return Err(IdError::TooLong {
            what,
            max: rules.max_length,
        });
    }
    if id.contains('/') || id.contains('\\') {
        return Err(IdError::PathTraversal { what });
    }
    if id.chars().any(|c| c.is_control()) {
        let chars = id
            .chars()
            .filter(|c| c.is_control())
            .map(|c| format!("\\u{{{:04x}}}", c as u32))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(IdError::ControlCharacters { what, chars });
    }
    if reserved_names().contains(id.to_lowercase().as_str()) {
        return Err(IdError::Reserved { what });
    }
    Ok(id.to_string())
}

pub fn validate_owner_id(owner: &str) -> Result<String, IdError> {
    validate_id(owner, &IdRules::owner())
}

pub fn validate_save_id(save_id: &str) -> Result<String, IdError> {
    validate_id(save_id, &IdRules::save())
}

/// Fresh save identifier.
pub fn new_save_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Generate a filesystem-safe name using URL encoding
pub fn safe_filename(name: &str) -> String {
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
    utf8_percent_encode(name, NON_ALPHANUMERIC).to_string()
}

/// Directory holding every save of `owner`.
pub fn secure_owner_dir(data_dir: &Path, owner: &str) -> Result<PathBuf, IdError> {
    let owner = validate_owner_id(owner)?;
    Ok(data_dir.join("saves").join(safe_filename(&owner)))
}

/// `{data_dir}/saves/{owner}/{save_id}.json`, both parts percent-encoded.
pub fn secure_save_path(data_dir: &Path, owner: &str, save_id: &str) -> Result<PathBuf, IdError> {
    let dir = secure_owner_dir(data_dir, owner)?;
    let save_id = validate_save_id(save_id)?;
    let path = dir.join(format!("{}.json", safe_filename(&save_id)));
    if !path.starts_with(data_dir) {
        return Err(IdError::PathTraversal { what: "save id" });
    }
    Ok(path)
}

pub fn validate_file_size(size: u64, max_size: u64) -> Result<(), IdError> {
    if size > max_size {
        return Err(IdError::FileSizeExceeded { limit: max_size });
    }
    Ok(())
}

/// Parse a JSON document with a size cap. Leading NUL bytes left behind by an
/// interrupted write are stripped first.
pub fn secure_json_parse<T>(content: &str, max_bytes: u64) -> Result<T, IdError>
where
    T: serde::de::DeserializeOwned,
{
    validate_file_size(content.len() as u64, max_bytes)?;
    let normalized = content.trim_start_matches('\0');
    serde_json::from_str(normalized).map_err(|e| IdError::InvalidFormat {
        reason: e.to_string(),
    })
}
