use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, Result};

/// Receipt images we accept
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

/// Maximum receipt size (10 MB)
pub const MAX_RECEIPT_SIZE: usize = 10 * 1024 * 1024;

const RECEIPTS_SUBDIR: &str = "receipts";

/// Lower-cased extension if the filename is an accepted image type.
pub fn receipt_extension(filename: &str) -> Result<String> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .ok_or_else(|| AppError::Validation("Invalid filename".to_string()))?;

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::Validation(format!(
            "Invalid file type. Allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    Ok(extension)
}

/// Save a bank-transfer receipt under `<uploads_dir>/receipts/`.
/// Returns the public path, e.g. "uploads/receipts/<uuid>.png".
pub async fn save_receipt(uploads_dir: &str, filename: &str, data: &[u8]) -> Result<String> {
    if data.is_empty() {
        return Err(AppError::BadRequest("No file uploaded".to_string()));
    }
    if data.len() > MAX_RECEIPT_SIZE {
        return Err(AppError::Validation("File too large (max 10 MB)".to_string()));
    }

    let extension = receipt_extension(filename)?;

    let receipts_path = PathBuf::from(uploads_dir).join(RECEIPTS_SUBDIR);
    fs::create_dir_all(&receipts_path).await.map_err(|e| {
        AppError::Internal(format!("Failed to create receipts directory: {}", e))
    })?;

    let new_filename = format!("{}.{}", Uuid::new_v4(), extension);
    let file_path = receipts_path.join(&new_filename);

    let mut file = fs::File::create(&file_path).await.map_err(|e| {
        AppError::Internal(format!("Failed to create file: {}", e))
    })?;

    file.write_all(data).await.map_err(|e| {
        AppError::Internal(format!("Failed to write file: {}", e))
    })?;

    Ok(format!("uploads/{}/{}", RECEIPTS_SUBDIR, new_filename))
}

/// Remove a receipt saved by [`save_receipt`]. Used when the database write
/// that should reference it fails.
pub async fn delete_receipt(uploads_dir: &str, public_path: &str) -> Result<()> {
    let Some(relative) = public_path.strip_prefix("uploads/") else {
        return Ok(());
    };
    // Only ever touch files inside the receipts directory
    if !relative.starts_with("receipts/") || relative.contains("..") {
        return Ok(());
    }

    let path = Path::new(uploads_dir).join(relative);
    if fs::try_exists(&path).await.unwrap_or(false) {
        fs::remove_file(&path).await.map_err(|e| {
            AppError::Internal(format!("Failed to delete file: {}", e))
        })?;
    }

    Ok(())
}
