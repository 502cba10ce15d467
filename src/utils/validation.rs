use crate::utils::error::{PipelineError, Result};

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(PipelineError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(PipelineError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(PipelineError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PipelineError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

/// A file name template must contain `placeholder` and must stay a single
/// path component once filled in.
pub fn validate_file_template(field_name: &str, template: &str, placeholder: &str) -> Result<()> {
    validate_non_empty_string(field_name, template)?;

    if !template.contains(placeholder) {
        return Err(PipelineError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: template.to_string(),
            reason: format!("Template must contain the {} placeholder", placeholder),
        });
    }

    if template.contains('/') || template.contains('\\') {
        return Err(PipelineError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: template.to_string(),
            reason: "Template must be a file name, not a path".to_string(),
        });
    }

    Ok(())
}
