pub mod admin;
pub mod articles;
pub mod auth;
pub mod pages;
pub mod projects;

use serde::Serialize;

use crate::{
    error::{AppError, Result},
    services::storage::{self, ImageInput},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Trimmed value, with blank strings treated as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required_title(title: Option<String>) -> Result<String> {
    non_empty(title).ok_or_else(|| AppError::Validation("title is required".to_string()))
}

/// Resolves the image sent with a create or update.
///
/// Returns the reference to store on the row and, when this call wrote a
/// new file, that file's reference so it can be discarded if the row write
/// fails. A managed `/uploads/...` link is only accepted when it is the
/// row's current image.
async fn store_image(
    state: &AppState,
    input: ImageInput,
    current: Option<&str>,
) -> Result<(Option<String>, Option<String>)> {
    let input = match input {
        ImageInput::Link(link) => {
            let link = storage::local_reference(&state.config.public_base_url, &link);
            if storage::is_managed_path(&link) && current != Some(link.as_str()) {
                return Err(AppError::Validation(
                    "image refers to an upload that does not belong to this record".to_string(),
                ));
            }
            ImageInput::Link(link)
        }
        other => other,
    };

    let fresh = matches!(input, ImageInput::Bytes { .. });
    let reference = state.images.persist(input).await?;
    let written = if fresh { reference.clone() } else { None };
    Ok((reference, written))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_absent() {
        assert_eq!(non_empty(None), None);
        assert_eq!(non_empty(Some("   ".to_string())), None);
        assert_eq!(non_empty(Some(" a b ".to_string())), Some("a b".to_string()));
    }

    #[test]
    fn title_is_required() {
        assert!(required_title(Some("".to_string())).is_err());
        assert_eq!(required_title(Some(" Hi ".to_string())).unwrap(), "Hi");
    }
}
