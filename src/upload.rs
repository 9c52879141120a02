use std::fs;
use std::path::Path;

use actix_multipart::{Field, MultipartError};
use futures_util::TryStreamExt;
use uuid::Uuid;

use crate::schedule_store;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Strips any path components from a client-supplied file name and replaces
/// everything outside [A-Za-z0-9._-] with underscores. Returns `None` when
/// nothing usable remains.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

pub fn has_image_extension(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, extension)) => IMAGE_EXTENSIONS
            .iter()
            .any(|allowed| extension.eq_ignore_ascii_case(allowed)),
        None => false,
    }
}

pub async fn read_field_bytes(field: &mut Field) -> Result<Vec<u8>, MultipartError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await? {
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

pub async fn read_text_field(field: &mut Field) -> Result<String, MultipartError> {
    let bytes = read_field_bytes(field).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Image upload policy: whitelisted extension, stored on disk under
/// `image_dir` as `<uuid>-<name>`. Returns the path relative to the upload
/// root, the form the `photo` and `profile_image_path` columns store.
pub async fn save_image(field: &mut Field, image_dir: &Path) -> Result<String, String> {
    let file_name = field
        .content_disposition()
        .get_filename()
        .and_then(sanitize_file_name)
        .ok_or_else(|| "The uploaded file has no usable file name.".to_string())?;

    if !has_image_extension(&file_name) {
        return Err(format!(
            "Only image uploads are accepted ({}).",
            IMAGE_EXTENSIONS.join(", ")
        ));
    }

    let bytes = read_field_bytes(field)
        .await
        .map_err(|err| format!("Failed to read the uploaded file: {err}"))?;

    let stored_name = format!("{}-{}", Uuid::new_v4(), file_name);
    fs::write(image_dir.join(&stored_name), bytes)
        .map_err(|err| format!("Failed to store the uploaded file: {err}"))?;

    Ok(format!("images/{stored_name}"))
}

/// Schedule file policy: must be valid JSON carrying a top-level `schedules`
/// array (a bare array is auto-wrapped). The normalized document is what
/// lands on disk. Returns the stored file name and its record count.
pub async fn save_schedule_file(
    field: &mut Field,
    schedule_dir: &Path,
) -> Result<(String, usize), String> {
    let file_name = field
        .content_disposition()
        .get_filename()
        .and_then(sanitize_file_name)
        .ok_or_else(|| "The uploaded file has no usable file name.".to_string())?;

    if !file_name.to_ascii_lowercase().ends_with(".json") {
        return Err("Only .json schedule files are accepted.".to_string());
    }

    let bytes = read_field_bytes(field)
        .await
        .map_err(|err| format!("Failed to read the uploaded file: {err}"))?;

    let normalized = schedule_store::normalize_upload(&bytes)?;
    let count = schedule_store::record_count(&normalized);

    let stored_name = format!("{}-{}", Uuid::new_v4(), file_name);
    let pretty = serde_json::to_vec_pretty(&normalized)
        .map_err(|err| format!("Failed to serialize the schedule file: {err}"))?;
    fs::write(schedule_dir.join(&stored_name), pretty)
        .map_err(|err| format!("Failed to store the schedule file: {err}"))?;

    Ok((stored_name, count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(
            sanitize_file_name("../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_file_name("C:\\photos\\room.jpg").as_deref(),
            Some("room.jpg")
        );
    }

    #[test]
    fn sanitize_replaces_odd_characters() {
        assert_eq!(
            sanitize_file_name("room 101 (am).jpg").as_deref(),
            Some("room_101__am_.jpg")
        );
    }

    #[test]
    fn sanitize_rejects_empty_and_dot_names() {
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name(".."), None);
        assert_eq!(sanitize_file_name("uploads/"), None);
    }

    #[test]
    fn image_extension_whitelist() {
        assert!(has_image_extension("photo.JPG"));
        assert!(has_image_extension("photo.webp"));
        assert!(!has_image_extension("photo.svg"));
        assert!(!has_image_extension("photo"));
        assert!(!has_image_extension("schedule.json"));
    }
}
