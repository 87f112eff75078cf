use crate::utils::error::{PortalError, Result};
use std::collections::HashSet;
use std::path::PathBuf;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(PortalError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(PortalError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: usize, min_value: usize) -> Result<()> {
    if value < min_value {
        return Err(PortalError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

/// Extensions are bare names like `html`: no leading dot, no separators, no duplicates.
pub fn validate_extensions(field_name: &str, extensions: &[String]) -> Result<()> {
    if extensions.is_empty() {
        return Err(PortalError::MissingConfigError {
            field: field_name.to_string(),
        });
    }

    let mut seen = HashSet::new();
    for extension in extensions {
        let reason = if extension.trim().is_empty() {
            Some("Extension cannot be empty")
        } else if extension.starts_with('.') {
            Some("Extension must not start with a dot")
        } else if extension.contains(['/', '\\', '\0']) {
            Some("Extension must not contain path separators")
        } else if !seen.insert(extension.to_ascii_lowercase()) {
            Some("Extension is listed twice")
        } else {
            None
        };

        if let Some(reason) = reason {
            return Err(PortalError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: extension.clone(),
                reason: reason.to_string(),
            });
        }
    }

    Ok(())
}

/// Accepts a plain path or the `file://` URL form handed out by build-done hooks.
pub fn resolve_output_dir(value: &str) -> Result<PathBuf> {
    validate_path("output_dir", value)?;

    if !value.starts_with("file:") {
        return Ok(PathBuf::from(value));
    }

    let url = Url::parse(value).map_err(|e| PortalError::InvalidOutputDir {
        value: value.to_string(),
        reason: format!("Invalid URL format: {}", e),
    })?;

    url.to_file_path().map_err(|_| PortalError::InvalidOutputDir {
        value: value.to_string(),
        reason: "URL does not name a local path".to_string(),
    })
}
