//! Sequential scene loading with stale-request detection.
//!
//! Every load takes a [`LoadTicket`] from the session's [`LoadTracker`].
//! Starting a newer load invalidates all older tickets, so a slow response
//! for a scan the user already left can never overwrite the current scene.

use crate::{
    error::{AnnotationError, AnnotationResult},
    obb::OrientedBox,
    pointcloud::PointCloud,
    record::{decode_boxes, BoxFailure, DeletionMarker},
    store::BoxStore,
};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct LoadTracker {
    latest: Arc<AtomicU64>,
}

impl LoadTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket that supersedes every earlier one.
    pub fn begin(&self) -> LoadTicket {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        LoadTicket {
            id,
            latest: Arc::clone(&self.latest),
        }
    }

    /// Invalidate every outstanding ticket without starting a new load.
    pub fn cancel_all(&self) {
        self.latest.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct LoadTicket {
    id: u64,
    latest: Arc<AtomicU64>,
}

impl LoadTicket {
    pub fn is_current(&self) -> bool {
        self.latest.load(Ordering::SeqCst) == self.id
    }

    fn ensure_current(&self, object_id: &str) -> AnnotationResult<()> {
        if self.is_current() {
            Ok(())
        } else {
            debug!(object_id, ticket = self.id, "dropping stale load");
            Err(AnnotationError::Superseded {
                object_id: object_id.to_string(),
            })
        }
    }
}

/// What to fetch for one scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneRequest {
    pub object_id: String,
    pub boxes_path: String,
    pub points_path: Option<String>,
}

#[derive(Debug)]
pub struct LoadedScene {
    pub object_id: String,
    pub boxes: Vec<OrientedBox>,
    pub failures: Vec<BoxFailure>,
    pub points: Option<PointCloud>,
    pub marker: Option<DeletionMarker>,
}

/// Fetch boxes, then points, then the deletion marker.
///
/// The ticket is checked after every fetch; once it goes stale the load stops
/// with [`AnnotationError::Superseded`].
pub async fn load_scene<S: BoxStore>(
    store: &S,
    request: &SceneRequest,
    ticket: &LoadTicket,
) -> AnnotationResult<LoadedScene> {
    let object_id = request.object_id.as_str();

    let text = store.fetch_boxes(&request.boxes_path).await?;
    ticket.ensure_current(object_id)?;
    let decoded = decode_boxes(&text)?;

    let points = match &request.points_path {
        Some(path) => {
            let bytes = store.fetch_points(path).await?;
            ticket.ensure_current(object_id)?;
            Some(PointCloud::from_ply(&bytes)?)
        }
        None => None,
    };

    let marker = store.fetch_marker(object_id).await?;
    ticket.ensure_current(object_id)?;

    info!(
        object_id,
        boxes = decoded.boxes.len(),
        failures = decoded.failures.len(),
        points = points.as_ref().map_or(0, PointCloud::len),
        "loaded scene"
    );

    Ok(LoadedScene {
        object_id: request.object_id.clone(),
        boxes: decoded.boxes,
        failures: decoded.failures,
        points,
        marker,
    })
}
