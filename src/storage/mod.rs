// Storage for generated images and their metadata

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::{GeneratedImage, GenerationParams, ImageRecord};

pub struct ImageStore {
    images_dir: PathBuf,
}

impl ImageStore {
    pub fn new() -> Result<Self> {
        let images_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?
            .join("promptshot")
            .join("images");

        Self::with_root(images_dir)
    }

    pub fn with_root(images_dir: impl Into<PathBuf>) -> Result<Self> {
        let images_dir = images_dir.into();
        fs::create_dir_all(&images_dir).context("Failed to create images directory")?;

        Ok(Self { images_dir })
    }

    pub fn root(&self) -> &Path {
        &self.images_dir
    }

    pub fn image_path(&self, id: &Uuid) -> PathBuf {
        self.images_dir.join(format!("{id}.png"))
    }

    pub fn get_metadata_path(&self, id: &Uuid) -> PathBuf {
        self.images_dir.join(format!("{id}_meta.json"))
    }

    /// Decode and write the image, then its metadata sidecar
    pub fn save(
        &self,
        image: &GeneratedImage,
        prompt: &str,
        model_id: &str,
        params: &GenerationParams,
    ) -> Result<ImageRecord> {
        let bytes = image.bytes().context("Image payload is not valid base64")?;

        let record = ImageRecord::new(
            prompt.to_string(),
            model_id.to_string(),
            params.clone(),
            bytes.len(),
        );

        fs::write(self.image_path(&record.id), &bytes).context("Failed to write image file")?;

        let json = serde_json::to_string_pretty(&record).context("Failed to serialize metadata")?;
        fs::write(self.get_metadata_path(&record.id), json)
            .context("Failed to write metadata file")?;

        log::info!("Saved image {} ({} bytes)", record.id, record.size_bytes);
        Ok(record)
    }

    /// All saved records, newest first. Unreadable sidecars are skipped.
    pub fn list_records(&self) -> Result<Vec<ImageRecord>> {
        let mut records = Vec::new();

        let entries = fs::read_dir(&self.images_dir).context("Failed to read images directory")?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();

            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with("_meta.json") {
                continue;
            }

            match fs::read_to_string(&path)
                .map_err(anyhow::Error::from)
                .and_then(|content| Ok(serde_json::from_str::<ImageRecord>(&content)?))
            {
                Ok(record) => records.push(record),
                Err(e) => log::warn!("Skipping unreadable metadata {}: {e}", path.display()),
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_MODEL_ID;
    use tempfile::TempDir;

    fn create_test_store() -> (ImageStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = ImageStore::with_root(temp_dir.path().join("images")).unwrap();
        (store, temp_dir)
    }

    fn save_fox(store: &ImageStore) -> ImageRecord {
        store
            .save(
                &GeneratedImage::new("QUJD".to_string()),
                "a red fox",
                DEFAULT_MODEL_ID,
                &GenerationParams::default(),
            )
            .unwrap()
    }

    #[test]
    fn test_with_root_creates_directory() {
        let (store, _temp) = create_test_store();
        assert!(store.root().is_dir());
    }

    #[test]
    fn test_save_writes_image_and_metadata() {
        let (store, _temp) = create_test_store();
        let record = save_fox(&store);

        assert_eq!(fs::read(store.image_path(&record.id)).unwrap(), b"ABC");
        assert_eq!(record.size_bytes, 3);
        assert_eq!(record.prompt, "a red fox");

        let loaded = store.list_records().unwrap();
        assert_eq!(loaded, vec![record]);
    }

    #[test]
    fn test_save_rejects_invalid_base64() {
        let (store, _temp) = create_test_store();
        let result = store.save(
            &GeneratedImage::new("%%%".to_string()),
            "a red fox",
            DEFAULT_MODEL_ID,
            &GenerationParams::default(),
        );

        assert!(result.is_err());
        assert!(store.list_records().unwrap().is_empty());
    }

    #[test]
    fn test_list_records_newest_first() {
        let (store, _temp) = create_test_store();
        let first = save_fox(&store);
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = save_fox(&store);

        let records = store.list_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, second.id);
        assert_eq!(records[1].id, first.id);
    }

    #[test]
    fn test_list_records_skips_garbage() {
        let (store, _temp) = create_test_store();
        save_fox(&store);
        fs::write(store.root().join("broken_meta.json"), "{not json").unwrap();

        assert_eq!(store.list_records().unwrap().len(), 1);
    }
}
