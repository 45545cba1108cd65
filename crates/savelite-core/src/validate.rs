//! Input validation for everything that ends up in a file-system path
//!
//! Profile and file names are joined onto the persistence root, so they are
//! checked to stay inside it.

use crate::error::{Error, Result};

const MAX_NAME_LENGTH: usize = 255;
const MAX_PATH_LENGTH: usize = 4096;

/// Validates the persistence root
///
/// # Security
///
/// - Prevents empty roots
/// - Prevents null bytes
/// - Prevents oversized paths
///
/// # Errors
///
/// Returns Error::InvalidConfig if validation fails
#[inline]
pub fn validate_root(root: &str) -> Result<()> {
    if root.trim().is_empty() {
        return Err(Error::InvalidConfig(
            "Persistence root cannot be empty".to_string(),
        ));
    }

    if root.len() > MAX_PATH_LENGTH {
        return Err(Error::InvalidConfig(format!(
            "Persistence root length {} exceeds maximum {}",
            root.len(),
            MAX_PATH_LENGTH
        )));
    }

    if root.contains('\0') {
        return Err(Error::InvalidConfig(
            "Persistence root cannot contain null bytes".to_string(),
        ));
    }

    Ok(())
}

/// Validates a single path component (profile or file base name)
///
/// # Security
///
/// - Prevents path traversal attacks
/// - Prevents invalid filesystem characters
///
/// # Errors
///
/// Returns Error::InvalidConfig if validation fails
#[inline]
pub fn validate_component(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidConfig(format!("{} cannot be empty", what)));
    }

    if name.len() > MAX_NAME_LENGTH {
        return Err(Error::InvalidConfig(format!(
            "{} length {} exceeds maximum {}",
            what,
            name.len(),
            MAX_NAME_LENGTH
        )));
    }

    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(Error::InvalidConfig(format!(
            "{} cannot contain path separators or '..'",
            what
        )));
    }

    if name.contains('\0') {
        return Err(Error::InvalidConfig(format!(
            "{} cannot contain null bytes",
            what
        )));
    }

    Ok(())
}
