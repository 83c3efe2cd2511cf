//! Naming and admission rules for uploaded images.

use crate::error::CapabilityError;
use crate::traits::{BlobDestination, ImageBlob};

/// Image formats accepted for upload.
pub const ALLOWED_IMAGE_FORMATS: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Largest accepted upload (5 MiB).
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Stored filename: `<unix_millis>_<sanitized>`.
pub fn stored_filename(requested: &str, unix_millis: i64) -> String {
    format!("{unix_millis}_{}", sanitize_filename(requested))
}

/// Object key: `<user_id>/<stored filename>`.
pub fn object_key(user_id: &str, stored_filename: &str) -> String {
    format!("{user_id}/{stored_filename}")
}

/// Reject blobs that storage must never receive.
pub fn check_upload(image: &ImageBlob, destination: &BlobDestination) -> Result<(), CapabilityError> {
    if !ALLOWED_IMAGE_FORMATS.contains(&image.mime_type.as_str()) {
        return Err(CapabilityError::InvalidInput(format!(
            "Unsupported image format '{}'. Must be one of: {ALLOWED_IMAGE_FORMATS:?}",
            image.mime_type
        )));
    }
    if image.bytes.is_empty() {
        return Err(CapabilityError::InvalidInput("Image is empty".into()));
    }
    if image.bytes.len() > MAX_UPLOAD_BYTES {
        return Err(CapabilityError::InvalidInput(format!(
            "Image is {} bytes; the limit is {MAX_UPLOAD_BYTES}",
            image.bytes.len()
        )));
    }
    if destination.user_id.trim().is_empty() || destination.user_id.contains('/') {
        return Err(CapabilityError::InvalidInput(format!(
            "Invalid storage owner '{}'",
            destination.user_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dest() -> BlobDestination {
        BlobDestination {
            user_id: "user_1".into(),
            filename: "edited_cat.png".into(),
        }
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("edited_my cat (1).png"), "edited_my_cat__1_.png");
        assert_eq!(sanitize_filename("صورة.jpg"), "____.jpg");
        assert_eq!(sanitize_filename("plain-name.webp"), "plain-name.webp");
    }

    #[test]
    fn key_is_user_scoped_and_timestamped() {
        let filename = stored_filename("edited_cat.png", 1_700_000_000_000);
        assert_eq!(filename, "1700000000000_edited_cat.png");
        assert_eq!(object_key("user_1", &filename), "user_1/1700000000000_edited_cat.png");
    }

    #[test]
    fn accepts_supported_image() {
        let image = ImageBlob::new(vec![1, 2, 3], "image/png");
        assert!(check_upload(&image, &dest()).is_ok());
    }

    #[test]
    fn rejects_unsupported_format() {
        let image = ImageBlob::new(vec![1, 2, 3], "image/gif");
        assert!(matches!(
            check_upload(&image, &dest()),
            Err(CapabilityError::InvalidInput(_))
        ));
    }

    #[test]
    fn rejects_oversized_image() {
        let image = ImageBlob::new(vec![0; MAX_UPLOAD_BYTES + 1], "image/jpeg");
        assert!(check_upload(&image, &dest()).is_err());
    }

    #[test]
    fn rejects_path_in_owner() {
        let image = ImageBlob::new(vec![1], "image/jpeg");
        let dest = BlobDestination {
            user_id: "../other".into(),
            filename: "x.jpg".into(),
        };
        assert!(check_upload(&image, &dest).is_err());
    }
}
