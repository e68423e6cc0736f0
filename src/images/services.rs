use anyhow::Context;
use base64ct::{Base64, Encoding};
use bytes::Bytes;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Image decoded from a `data:<mime>;base64,<payload>` URL.
#[derive(Debug)]
pub struct DecodedImage {
    pub content_type: String,
    pub ext: &'static str,
    pub body: Bytes,
}

pub fn decode_data_url(raw: &str) -> AppResult<DecodedImage> {
    let rest = raw
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| AppError::validation("Image must be a data URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| AppError::validation("Image must be a data URL"))?;
    let content_type = meta
        .strip_suffix(";base64")
        .ok_or_else(|| AppError::validation("Image must be base64 encoded"))?
        .to_ascii_lowercase();
    let ext = ext_from_mime(&content_type)
        .ok_or_else(|| AppError::validation("Unsupported image type"))?;

    let bytes = Base64::decode_vec(payload.trim())
        .map_err(|_| AppError::validation("Invalid base64 image"))?;
    if bytes.is_empty() {
        return Err(AppError::validation("Image is empty"));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::validation("Image is too large"));
    }

    Ok(DecodedImage {
        content_type,
        ext,
        body: Bytes::from(bytes),
    })
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

/// Uploads a recipe image and returns its object key.
pub async fn upload_recipe_image(
    st: &AppState,
    author_id: Uuid,
    image: DecodedImage,
) -> anyhow::Result<String> {
    let key = format!("recipes/{}/{}.{}", author_id, Uuid::new_v4(), image.ext);
    st.storage
        .put_object(&key, image.body, &image.content_type)
        .await
        .with_context(|| format!("put_object {}", key))?;
    Ok(key)
}

/// Best-effort removal of a replaced image.
pub async fn discard_image(st: &AppState, key: &str) {
    if let Err(e) = st.storage.delete_object(key).await {
        tracing::warn!(error = %e, key, "failed to delete image");
    }
}

#[cfg(test)]
mod image_tests {
    use super::*;
    use crate::storage::StorageClient;

    // 1x1 transparent PNG
    const PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[test]
    fn decodes_png_data_url() {
        let img = decode_data_url(PNG).expect("valid data url");
        assert_eq!(img.content_type, "image/png");
        assert_eq!(img.ext, "png");
        assert_eq!(&img.body[1..4], b"PNG");
    }

    #[test]
    fn rejects_malformed_data_urls() {
        for bad in [
            "iVBORw0KGgo=",
            "data:image/png,plain",
            "data:text/plain;base64,aGVsbG8=",
            "data:image/png;base64,@@@",
            "data:image/png;base64,",
        ] {
            assert!(
                matches!(decode_data_url(bad), Err(AppError::Validation(_))),
                "{bad} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn upload_uses_author_prefix() {
        let state = AppState::fake();
        let author = Uuid::new_v4();
        let key = upload_recipe_image(&state, author, decode_data_url(PNG).unwrap())
            .await
            .unwrap();
        assert!(key.starts_with(&format!("recipes/{}/", author)));
        assert!(key.ends_with(".png"));

        let url = state.storage.presign_get(&key, 60).await.unwrap();
        assert!(url.contains(&key));
    }
}
