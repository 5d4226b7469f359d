use crate::error::{CardexError, CardexResult};
use std::path::Path;
use validator::{Validate, ValidationErrors};

pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

pub fn validate_model<T: Validate>(model: &T) -> CardexResult<()> {
    match model.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let error_messages = format_validation_errors(&errors);
            Err(CardexError::validation("request", error_messages))
        }
    }
}

pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(field, _)| *field);

    let mut messages = Vec::new();
    for (field, field_errors) in fields {
        for error in field_errors {
            let message = match (&error.message, error.code.as_ref()) {
                (Some(message), _) => message.to_string(),
                (None, "range") => format!("Value out of range for field '{}'", field),
                (None, "required") => format!("Field '{}' is required", field),
                (None, code) => format!("Validation failed for field '{}': {}", field, code),
            };
            messages.push(message);
        }
    }

    messages.join(", ")
}

/// Resolve which model a batch runs with.
///
/// No override selects the default; an override must appear in the allow-list.
pub fn resolve_model(
    requested: Option<&str>,
    default_model: &str,
    allowed_models: &[String],
) -> CardexResult<String> {
    match requested.map(str::trim).filter(|m| !m.is_empty()) {
        None => Ok(default_model.to_string()),
        Some(model) if allowed_models.iter().any(|allowed| allowed == model) => {
            Ok(model.to_string())
        }
        Some(model) => Err(CardexError::model_not_allowed(model, allowed_models)),
    }
}

pub fn is_valid_image_extension(file_name: impl AsRef<Path>) -> bool {
    file_name
        .as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
