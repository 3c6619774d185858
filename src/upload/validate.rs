//! Extension allow-list validation.

use crate::error::ValidationError;

use super::UploadItem;

/// Extensions accepted for upload, compared case-insensitively.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "bmp"];

/// Check whether a declared file name carries an allowed image extension.
///
/// The extension is whatever follows the last `.`; a name without a dot is
/// never allowed.
pub fn is_allowed_file(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => ALLOWED_EXTENSIONS
            .iter()
            .any(|allowed| ext.eq_ignore_ascii_case(allowed)),
        None => false,
    }
}

/// Validate a whole batch before any transcoding happens.
///
/// # Errors
///
/// - [`ValidationError::EmptyBatch`] if the batch is empty or the first item
///   has an empty name (browsers send one nameless part when nothing is picked)
/// - [`ValidationError::InvalidFileType`] naming the first offending item
pub fn validate_batch(items: &[UploadItem]) -> Result<(), ValidationError> {
    match items.first() {
        None => return Err(ValidationError::EmptyBatch),
        Some(first) if first.name.is_empty() => return Err(ValidationError::EmptyBatch),
        Some(_) => {}
    }

    if let Some(bad) = items.iter().find(|item| !is_allowed_file(&item.name)) {
        return Err(ValidationError::InvalidFileType {
            filename: bad.name.clone(),
        });
    }

    Ok(())
}
