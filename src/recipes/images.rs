use uuid::Uuid;

use crate::error::AppError;

/// TTL for presigned image URLs handed out in responses.
pub const IMAGE_URL_TTL_SECS: u64 = 30 * 60;

pub fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Identify the image format from its magic bytes.
pub fn sniff_image(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

/// Validate an upload before anything is persisted: the declared content type
/// and the sniffed format must both be supported and must agree. Returns the
/// file extension to store under.
pub fn validate_image(content_type: &str, bytes: &[u8]) -> Result<&'static str, AppError> {
    let declared = ext_from_mime(content_type)
        .ok_or_else(|| AppError::field("image", "Unsupported image type."))?;
    let sniffed = sniff_image(bytes)
        .and_then(ext_from_mime)
        .ok_or_else(|| AppError::field("image", "Upload a valid image."))?;
    if declared != sniffed {
        return Err(AppError::field(
            "image",
            "Image data does not match its content type.",
        ));
    }
    Ok(declared)
}

/// Object-store key for a recipe image. A fresh UUID per upload so a replaced
/// image never collides with the object it supersedes.
pub fn image_key(user_id: Uuid, recipe_id: Uuid, ext: &str) -> String {
    format!("recipes/{}/{}-{}.{}", user_id, recipe_id, Uuid::new_v4(), ext)
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
    const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];
    const WEBP: &[u8] = b"RIFF\x24\x00\x00\x00WEBPVP8 ";

    #[test]
    fn ext_from_mime_known_types() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
        assert_eq!(ext_from_mime("text/plain"), None);
    }

    #[test]
    fn sniffs_magic_bytes() {
        assert_eq!(sniff_image(JPEG), Some("image/jpeg"));
        assert_eq!(sniff_image(PNG), Some("image/png"));
        assert_eq!(sniff_image(WEBP), Some("image/webp"));
        assert_eq!(sniff_image(b"just some text"), None);
        assert_eq!(sniff_image(&[]), None);
    }

    #[test]
    fn validate_accepts_matching_upload() {
        assert_eq!(validate_image("image/jpeg", JPEG).unwrap(), "jpg");
        assert_eq!(validate_image("image/jpg", JPEG).unwrap(), "jpg");
        assert_eq!(validate_image("image/png", PNG).unwrap(), "png");
    }

    #[test]
    fn validate_rejects_unsupported_content_type() {
        assert!(validate_image("application/octet-stream", JPEG).is_err());
    }

    #[test]
    fn validate_rejects_non_image_payload() {
        assert!(validate_image("image/jpeg", b"not an image").is_err());
    }

    #[test]
    fn validate_rejects_mismatched_payload() {
        assert!(validate_image("image/png", JPEG).is_err());
    }

    #[test]
    fn image_keys_are_unique_per_upload() {
        let user = Uuid::new_v4();
        let recipe = Uuid::new_v4();
        let a = image_key(user, recipe, "jpg");
        let b = image_key(user, recipe, "jpg");
        assert_ne!(a, b);
        assert!(a.starts_with(&format!("recipes/{}/{}-", user, recipe)));
        assert!(a.ends_with(".jpg"));
    }
}
