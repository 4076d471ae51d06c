//! Input checks run before any request is issued.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::ValidationError;

pub const QUERY_MIN_CHARS: usize = 10;
pub const QUERY_MAX_CHARS: usize = 500;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const MAX_FILE_NAME_CHARS: usize = 255;
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
    static ref DATA_URL_PREFIX: Regex = Regex::new(r"^data:[^;,]+;base64,").unwrap();
}

/// Returns the trimmed query when its length is inside the accepted window
pub fn validate_query(query: &str) -> Result<&str, ValidationError> {
    let trimmed = query.trim();
    let chars = trimmed.chars().count();

    if chars == 0 {
        return Err(ValidationError::EmptyQuery);
    }
    if chars < QUERY_MIN_CHARS {
        return Err(ValidationError::QueryTooShort {
            min: QUERY_MIN_CHARS,
            actual: chars,
        });
    }
    if chars > QUERY_MAX_CHARS {
        return Err(ValidationError::QueryTooLong {
            max: QUERY_MAX_CHARS,
            actual: chars,
        });
    }
    Ok(trimmed)
}

pub fn validate_email(email: &str) -> Result<&str, ValidationError> {
    let trimmed = email.trim();
    if EMAIL_RE.is_match(trimmed) {
        Ok(trimmed)
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

pub fn validate_file_name(file_name: &str) -> Result<(), ValidationError> {
    let len = file_name.chars().count();
    if len >= MAX_FILE_NAME_CHARS {
        return Err(ValidationError::FileNameTooLong {
            len,
            max: MAX_FILE_NAME_CHARS,
        });
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(stem, ext)| (stem, ext.to_lowercase()));
    match extension {
        Some((stem, ext)) if !stem.is_empty() && ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => {
            Ok(())
        }
        Some((_, ext)) => Err(ValidationError::UnsupportedExtension(format!(".{}", ext))),
        None => Err(ValidationError::UnsupportedExtension(file_name.to_string())),
    }
}

pub fn validate_file_size(size: usize) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(ValidationError::FileTooLarge {
            size,
            max: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Checks name, payload encoding and decoded size of a spreadsheet upload.
/// Returns the decoded byte length.
pub fn validate_upload(file_name: &str, file_base64: &str) -> Result<usize, ValidationError> {
    validate_file_name(file_name)?;
    let bytes = decode_base64(file_base64).map_err(|_| ValidationError::MalformedFile)?;
    validate_file_size(bytes.len())?;
    Ok(bytes.len())
}

/// Decodes standard base64, tolerating a `data:<mime>;base64,` prefix and line breaks
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let trimmed = payload.trim();
    let without_prefix = DATA_URL_PREFIX.replace(trimmed, "");
    let compact: String = without_prefix
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    STANDARD.decode(compact.as_bytes())
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
