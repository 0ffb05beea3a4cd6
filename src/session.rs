use crate::{
    config::EditorConfig,
    error::{AnnotationError, AnnotationResult},
    input::Action,
    loader::{LoadTicket, LoadTracker, LoadedScene},
    obb::OrientedBox,
    pointcloud::PointCloud,
    record::{decode_boxes, encode_boxes, BoxFailure, BoxRecord, DeletionMarker},
    store::BoxStore,
    types::{Corners, EditCommand, EDGES},
};
use itertools::Itertools;
use nalgebra as na;
use tracing::{debug, info};

/// What the viewport needs to draw one box.
#[derive(Debug, Clone, Copy)]
pub struct BoxOverlay<'a> {
    pub id: &'a str,
    pub corners: &'a Corners,
    pub selected: bool,
}

impl BoxOverlay<'_> {
    /// Endpoints of the 12 edges, laid out for a line-list vertex buffer.
    #[allow(clippy::cast_possible_truncation)]
    pub fn line_segments(&self) -> Vec<[f32; 3]> {
        EDGES
            .iter()
            .flat_map(|&(a, b)| [self.corners[a], self.corners[b]])
            .map(|p| [p.x as f32, p.y as f32, p.z as f32])
            .collect()
    }
}

/// The active box set of one scan and the current selection.
///
/// Edits only ever target selected boxes; the render layer reads
/// [`AnnotationSession::overlays`] and never holds on to the boxes.
#[derive(Debug)]
pub struct AnnotationSession {
    config: EditorConfig,
    object_id: Option<String>,
    boxes: Vec<OrientedBox>,
    /// Indices into `boxes`, primary selection first.
    selection: Vec<usize>,
    points: Option<PointCloud>,
    marker: Option<DeletionMarker>,
    loads: LoadTracker,
}

impl AnnotationSession {
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            object_id: None,
            boxes: Vec::new(),
            selection: Vec::new(),
            points: None,
            marker: None,
            loads: LoadTracker::new(),
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.object_id.is_some()
    }

    pub fn object_id(&self) -> Option<&str> {
        self.object_id.as_deref()
    }

    pub fn boxes(&self) -> &[OrientedBox] {
        &self.boxes
    }

    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    pub fn selected(&self) -> Option<&OrientedBox> {
        self.selection.first().map(|&i| &self.boxes[i])
    }

    pub fn point_cloud(&self) -> Option<&PointCloud> {
        self.points.as_ref()
    }

    pub fn marker(&self) -> Option<&DeletionMarker> {
        self.marker.as_ref()
    }

    /// Start a load; any load begun earlier can no longer be installed.
    pub fn begin_load(&self) -> LoadTicket {
        self.loads.begin()
    }

    /// Swap in a finished load. Stale tickets are rejected and leave the
    /// current scene untouched.
    pub fn install(&mut self, ticket: &LoadTicket, scene: LoadedScene) -> AnnotationResult<()> {
        if !ticket.is_current() {
            return Err(AnnotationError::Superseded {
                object_id: scene.object_id,
            });
        }
        info!(object_id = %scene.object_id, boxes = scene.boxes.len(), "installed scene");
        self.replace(scene.object_id, scene.boxes);
        self.points = scene.points;
        self.marker = scene.marker;
        Ok(())
    }

    /// Replace the box set from a JSON document already in memory. The point
    /// cloud is kept only when reloading the same scan. On a document-level
    /// error nothing changes.
    pub fn load_json(
        &mut self,
        object_id: impl Into<String>,
        json: &str,
    ) -> AnnotationResult<Vec<BoxFailure>> {
        let decoded = decode_boxes(json)?;
        let object_id = object_id.into();
        self.loads.cancel_all();
        let points = match self.object_id.as_deref() {
            Some(current) if current == object_id => self.points.take(),
            _ => None,
        };
        self.replace(object_id, decoded.boxes);
        self.points = points;
        Ok(decoded.failures)
    }

    /// Wholesale swap; point cloud and marker belong to the old scan.
    fn replace(&mut self, object_id: String, boxes: Vec<OrientedBox>) {
        self.selection = if boxes.is_empty() { vec![] } else { vec![0] };
        self.boxes = boxes;
        self.object_id = Some(object_id);
        self.points = None;
        self.marker = None;
    }

    pub fn select(&mut self, index: usize) -> bool {
        if index >= self.boxes.len() {
            return false;
        }
        self.selection = vec![index];
        true
    }

    /// Select exactly `indices`, primary first. Rejects out-of-range or
    /// repeated indices, and more than one index without multi-select.
    pub fn select_set(&mut self, indices: &[usize]) -> AnnotationResult<()> {
        if indices.is_empty() {
            return Err(AnnotationError::Validation("empty selection".to_string()));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.boxes.len()) {
            return Err(AnnotationError::Validation(format!(
                "box index {bad} out of range ({} boxes)",
                self.boxes.len()
            )));
        }
        if !indices.iter().all_unique() {
            return Err(AnnotationError::Validation(format!(
                "repeated box index in {indices:?}"
            )));
        }
        if indices.len() > 1 && !self.config.multi_select {
            return Err(AnnotationError::Validation("multi-select is disabled".to_string()));
        }
        self.selection = indices.to_vec();
        Ok(())
    }

    /// Add or remove a box from the selection; without multi-select this is
    /// a plain [`select`](Self::select).
    pub fn toggle_selection(&mut self, index: usize) -> bool {
        if !self.config.multi_select {
            return self.select(index);
        }
        if index >= self.boxes.len() {
            return false;
        }
        match self.selection.iter().position(|&i| i == index) {
            Some(pos) => {
                self.selection.remove(pos);
            }
            None => self.selection.push(index),
        }
        true
    }

    pub fn select_next(&mut self) {
        self.step_selection(1);
    }

    pub fn select_previous(&mut self) {
        self.step_selection(self.boxes.len().saturating_sub(1));
    }

    fn step_selection(&mut self, offset: usize) {
        let len = self.boxes.len();
        if len == 0 {
            return;
        }
        let next = self.selection.first().map_or(0, |&i| (i + offset) % len);
        self.selection = vec![next];
    }

    /// Apply an edit to every selected box; returns how many were edited.
    pub fn apply(&mut self, command: EditCommand) -> usize {
        let min_dimension = self.config.min_dimension;
        for &index in &self.selection {
            let obb = &mut self.boxes[index];
            obb.apply(command, min_dimension);
            debug!(id = %obb.id, ?command, "edited box");
        }
        self.selection.len()
    }

    pub fn drag_corner(
        &mut self,
        corner: usize,
        target: na::Point3<f64>,
    ) -> AnnotationResult<()> {
        let Some(&index) = self.selection.first() else {
            return Err(AnnotationError::Validation("no box selected".to_string()));
        };
        self.boxes[index].drag_corner(corner, target, self.config.min_dimension)
    }

    pub fn handle(&mut self, action: Action) {
        match action {
            Action::Edit(command) => {
                self.apply(command);
            }
            Action::SelectNext => self.select_next(),
            Action::DeleteSelected => {
                self.delete_selected();
            }
        }
    }

    /// Remove the selected boxes and select the box that took the primary's place.
    pub fn delete_selected(&mut self) -> Vec<OrientedBox> {
        let Some(&primary) = self.selection.first() else {
            return Vec::new();
        };

        let mut doomed = std::mem::take(&mut self.selection);
        doomed.sort_unstable();
        let removed: Vec<OrientedBox> = doomed
            .iter()
            .rev()
            .map(|&i| self.boxes.remove(i))
            .collect();

        let shift = doomed.iter().filter(|&&i| i < primary).count();
        if !self.boxes.is_empty() {
            self.selection = vec![(primary - shift).min(self.boxes.len() - 1)];
        }
        info!(removed = removed.len(), remaining = self.boxes.len(), "deleted boxes");
        removed.into_iter().rev().collect()
    }

    pub fn overlays(&self) -> Vec<BoxOverlay<'_>> {
        self.boxes
            .iter()
            .enumerate()
            .map(|(i, obb)| BoxOverlay {
                id: &obb.id,
                corners: obb.corners(),
                selected: self.selection.contains(&i),
            })
            .collect()
    }

    /// Storage records for every box, derived from the current corners.
    pub fn export(&self) -> AnnotationResult<Vec<BoxRecord>> {
        encode_boxes(&self.boxes)
    }

    /// Export and write the refined document. Failures are not retried.
    pub async fn save<S: BoxStore>(&self, store: &S) -> AnnotationResult<String> {
        let id = self.require_object_id()?;
        let records = self.export()?;
        store.save_boxes(id, &records).await
    }

    /// Opt the current scan out of the dataset.
    pub async fn mark_deleted<S: BoxStore>(&mut self, store: &S) -> AnnotationResult<String> {
        let id = self.require_object_id()?;
        let marker = DeletionMarker::now();
        let saved = store.save_marker(id, &marker).await?;
        self.marker = Some(marker);
        Ok(saved)
    }

    fn require_object_id(&self) -> AnnotationResult<&str> {
        self.object_id
            .as_deref()
            .ok_or_else(|| AnnotationError::Validation("no scan loaded".to_string()))
    }
}
