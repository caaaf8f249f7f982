//! Image file name normalization.
//!
//! Landmark photos arrive named after the landmark, usually in Cyrillic
//! (`Ласточкино гнездо.jpg`). Each file is renamed to an ASCII slug
//! (`Lastochkino_gnezdo.jpg`) and the landmark's stored image path is pointed
//! at the new name, which in turn fixes its translated name and public URL.

use crate::repository::LandmarkStore;
use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument, warn};

static DROPPED_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[.,«»'<>"]"#).expect("valid dropped-chars regex"));

/// Counts from one normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub files: usize,
    pub renamed: usize,
    pub failed: usize,
}

/// ASCII slug for an image file stem.
///
/// Transliterates to ASCII, maps `-` and spaces to `_`, and drops
/// `. , « » ' < > "`.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(slug_for("Ласточкино гнездо"), "Lastochkino_gnezdo");
/// ```
pub fn slug_for(stem: &str) -> String {
    let ascii = deunicode::deunicode(stem);
    let spaced = ascii.replace(['-', ' '], "_");
    DROPPED_CHARS.replace_all(&spaced, "").into_owned()
}

/// Split `file_name` into stem and extension (with its dot, or empty).
fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(i) if i > 0 => file_name.split_at(i),
        _ => (file_name, ""),
    }
}

/// Rename every file in `dir` to its slug and update the matching landmark.
///
/// A landmark is matched by name against the file stem. A failure on one
/// file is logged and the pass moves on; only an unreadable directory is an
/// error.
#[instrument(level = "info", skip_all, fields(dir = %dir.display()))]
pub async fn normalize_images(dir: &Path, store: &dyn LandmarkStore) -> Result<NormalizeReport> {
    let mut entries = fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to read images directory {}", dir.display()))?;
    let mut report = NormalizeReport::default();

    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("failed to list {}", dir.display()))?
    {
        match entry.file_type().await {
            Ok(kind) if kind.is_file() => {}
            Ok(_) => continue,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Cannot stat entry; skipping");
                continue;
            }
        }

        let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %entry.path().display(), "File name is not UTF-8; skipping");
            continue;
        };
        report.files += 1;

        let (stem, ext) = split_extension(&file_name);
        let new_name = format!("{}{}", slug_for(stem), ext);

        match store.update_image_path(stem, &new_name).await {
            Ok(0) => warn!(%file_name, "No landmark matches image"),
            Ok(updated) => info!(%file_name, %new_name, updated, "Updated image path"),
            Err(e) => {
                error!(%file_name, error = %e, "Failed to update image path");
                report.failed += 1;
                continue;
            }
        }

        if new_name == file_name {
            continue;
        }
        if let Err(e) = fs::rename(dir.join(&file_name), dir.join(&new_name)).await {
            error!(%file_name, %new_name, error = %e, "Failed to rename image file");
            report.failed += 1;
            continue;
        }
        report.renamed += 1;
    }

    info!(
        files = report.files,
        renamed = report.renamed,
        failed = report.failed,
        "Image normalization finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Landmark;
    use crate::repository::JsonStore;

    #[test]
    fn test_slug_for_cyrillic() {
        assert_eq!(slug_for("Ласточкино гнездо"), "Lastochkino_gnezdo");
    }

    #[test]
    fn test_slug_for_punctuation() {
        assert_eq!(slug_for("Mt. Ai-Petri, \"top\" <view>"), "Mt_Ai_Petri_top_view");
        assert_eq!(slug_for("a'b"), "ab");
        assert_eq!(slug_for("«Дом»"), "Dom");
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("photo.jpeg"), ("photo", ".jpeg"));
        assert_eq!(split_extension("a.b.png"), ("a.b", ".png"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".hidden"), (".hidden", ""));
    }

    #[tokio::test]
    async fn test_normalize_renames_and_updates_store() {
        let dir = std::env::temp_dir().join(format!("trailblazer-images-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("Ласточкино гнездо.jpg"), b"jpeg").unwrap();
        std::fs::write(dir.join("already_ascii.jpg"), b"jpeg").unwrap();

        let store = JsonStore::in_memory();
        store
            .save_landmarks(&[Landmark {
                name: "Ласточкино гнездо".to_string(),
                ..Default::default()
            }])
            .await
            .unwrap();

        let report = normalize_images(&dir, &store).await.unwrap();

        assert_eq!(
            report,
            NormalizeReport {
                files: 2,
                renamed: 1,
                failed: 0,
            }
        );
        assert!(dir.join("Lastochkino_gnezdo.jpg").is_file());
        assert!(!dir.join("Ласточкино гнездо.jpg").exists());
        assert!(dir.join("already_ascii.jpg").is_file());

        let landmark = store
            .get_landmark_by_name("Lastochkino_gnezdo")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(landmark.image_path, "Lastochkino_gnezdo.jpg");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let store = JsonStore::in_memory();
        let missing = std::env::temp_dir().join("trailblazer-images-does-not-exist");
        assert!(normalize_images(&missing, &store).await.is_err());
    }
}
