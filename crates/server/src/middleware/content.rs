use axum::{
    async_trait,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{error::AppError, services::storage::ImageInput, AppState};

const IMAGE_FIELD: &str = "image";

/// Body of a content create/update: either JSON or `multipart/form-data`.
///
/// The `image` field is pulled out before the rest is deserialized into
/// `T`. In multipart bodies it may be a file part or a text part; as text
/// (and in JSON) it is a data URL, a link, or empty to clear the image.
pub struct ContentForm<T> {
    pub fields: T,
    pub image: Option<ImageInput>,
}

#[async_trait]
impl<T> FromRequest<AppState> for ContentForm<T>
where
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("multipart/form-data"));

        let (map, image) = if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            read_multipart(multipart).await?
        } else {
            let Json(value) = Json::<Value>::from_request(req, state).await?;
            let Value::Object(mut map) = value else {
                return Err(AppError::BadRequest("Expected a JSON object".to_string()));
            };
            let image = match map.remove(IMAGE_FIELD) {
                None => None,
                Some(Value::Null) => Some(ImageInput::Remove),
                Some(Value::String(text)) => Some(ImageInput::from_text(&text)?),
                Some(_) => {
                    return Err(AppError::Validation("image must be a string".to_string()))
                }
            };
            (map, image)
        };

        let fields = serde_json::from_value(Value::Object(map))
            .map_err(|e| AppError::Validation(format!("Invalid fields: {e}")))?;

        Ok(ContentForm { fields, image })
    }
}

async fn read_multipart(
    mut multipart: Multipart,
) -> Result<(Map<String, Value>, Option<ImageInput>), AppError> {
    let mut map = Map::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == IMAGE_FIELD && field.file_name().is_some() {
            let file_name = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Failed to read image upload: {e}")))?;

            // Browsers send an empty file part when nothing was picked.
            if !data.is_empty() {
                image = Some(ImageInput::from_upload(
                    data.to_vec(),
                    file_name.as_deref(),
                    content_type.as_deref(),
                )?);
            }
            continue;
        }

        let text = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read field {name}: {e}")))?;

        if name == IMAGE_FIELD {
            image = Some(ImageInput::from_text(&text)?);
        } else {
            map.insert(name, Value::String(text));
        }
    }

    Ok((map, image))
}
