//! Storage collaborator: box documents, point buffers and deletion markers.
//!
//! The geometry code never sees the transport; it only needs "get JSON
//! array", "put JSON array" and "get point buffer".

use crate::{
    config::StorageConfig,
    error::{AnnotationError, AnnotationResult},
    record::{to_json, BoxRecord, DeletionMarker},
};
use std::{
    collections::HashMap,
    io::ErrorKind,
    path::PathBuf,
    sync::{Mutex, PoisonError},
};
use tracing::info;

#[allow(async_fn_in_trait)]
pub trait BoxStore {
    /// Raw JSON text of a box document.
    async fn fetch_boxes(&self, path: &str) -> AnnotationResult<String>;

    /// Write a refined document for `id`; returns where it was stored.
    async fn save_boxes(&self, id: &str, records: &[BoxRecord]) -> AnnotationResult<String>;

    async fn fetch_points(&self, path: &str) -> AnnotationResult<Vec<u8>>;

    async fn fetch_marker(&self, id: &str) -> AnnotationResult<Option<DeletionMarker>>;

    async fn save_marker(&self, id: &str, marker: &DeletionMarker) -> AnnotationResult<String>;
}

/// Rejects blank ids and empty payloads before anything is written.
pub fn validate_save(id: &str, records: &[BoxRecord]) -> AnnotationResult<()> {
    validate_id(id)?;
    if records.is_empty() {
        return Err(AnnotationError::Validation("no boxes to save".to_string()));
    }
    Ok(())
}

fn validate_id(id: &str) -> AnnotationResult<()> {
    if id.trim().is_empty() {
        return Err(AnnotationError::Validation("id is required".to_string()));
    }
    Ok(())
}

/// Documents under a local directory, laid out as `<root>/<id>/<id><suffix>`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    refined_suffix: String,
    marker_file: String,
}

impl FsStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            root: config.root.clone(),
            refined_suffix: config.refined_suffix.clone(),
            marker_file: config.marker_file.clone(),
        }
    }

    pub fn refined_path(&self, id: &str) -> PathBuf {
        self.root
            .join(id)
            .join(format!("{id}{}", self.refined_suffix))
    }

    pub fn marker_path(&self, id: &str) -> PathBuf {
        self.root.join(id).join(&self.marker_file)
    }

    async fn write(&self, path: PathBuf, contents: String) -> AnnotationResult<String> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|err| AnnotationError::network(dir.display(), err))?;
        }
        tokio::fs::write(&path, contents)
            .await
            .map_err(|err| AnnotationError::network(path.display(), err))?;
        Ok(path.display().to_string())
    }
}

impl BoxStore for FsStore {
    async fn fetch_boxes(&self, path: &str) -> AnnotationResult<String> {
        let path = self.root.join(path);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| AnnotationError::network(path.display(), err))
    }

    async fn save_boxes(&self, id: &str, records: &[BoxRecord]) -> AnnotationResult<String> {
        validate_save(id, records)?;
        let saved = self.write(self.refined_path(id), to_json(records)?).await?;
        info!(id, boxes = records.len(), path = %saved, "saved boxes");
        Ok(saved)
    }

    async fn fetch_points(&self, path: &str) -> AnnotationResult<Vec<u8>> {
        let path = self.root.join(path);
        tokio::fs::read(&path)
            .await
            .map_err(|err| AnnotationError::network(path.display(), err))
    }

    async fn fetch_marker(&self, id: &str) -> AnnotationResult<Option<DeletionMarker>> {
        let path = self.marker_path(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AnnotationError::network(path.display(), err)),
        }
    }

    async fn save_marker(&self, id: &str, marker: &DeletionMarker) -> AnnotationResult<String> {
        validate_id(id)?;
        let contents = serde_json::to_string_pretty(marker)?;
        let saved = self.write(self.marker_path(id), contents).await?;
        info!(id, path = %saved, "marked deleted");
        Ok(saved)
    }
}

/// In-process store keyed by path, for tests and offline sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), contents.into());
    }

    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn refined_path(id: &str) -> String {
        format!("{id}/{id}_3dbox_refined.json")
    }

    pub fn marker_path(id: &str) -> String {
        format!("{id}/deleted.json")
    }

    fn read(&self, path: &str) -> AnnotationResult<Vec<u8>> {
        self.get(path)
            .ok_or_else(|| AnnotationError::network(path, "not found"))
    }
}

impl BoxStore for MemoryStore {
    async fn fetch_boxes(&self, path: &str) -> AnnotationResult<String> {
        String::from_utf8(self.read(path)?)
            .map_err(|err| AnnotationError::parse(format!("{path} is not UTF-8: {err}")))
    }

    async fn save_boxes(&self, id: &str, records: &[BoxRecord]) -> AnnotationResult<String> {
        validate_save(id, records)?;
        let path = Self::refined_path(id);
        self.insert(path.clone(), to_json(records)?);
        Ok(path)
    }

    async fn fetch_points(&self, path: &str) -> AnnotationResult<Vec<u8>> {
        self.read(path)
    }

    async fn fetch_marker(&self, id: &str) -> AnnotationResult<Option<DeletionMarker>> {
        self.get(&Self::marker_path(id))
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(AnnotationError::from)
    }

    async fn save_marker(&self, id: &str, marker: &DeletionMarker) -> AnnotationResult<String> {
        validate_id(id)?;
        let path = Self::marker_path(id);
        self.insert(path.clone(), serde_json::to_vec(marker)?);
        Ok(path)
    }
}
