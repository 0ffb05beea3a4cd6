//! Persisted box documents.
//!
//! A document is a JSON array of [`BoxRecord`]s. Each element is decoded on
//! its own so one malformed box never hides the rest of the scan.

use crate::{
    error::{AnnotationError, AnnotationResult},
    obb::OrientedBox,
    rotation::RotationMatrix,
    types::Corners,
};
use chrono::{DateTime, Utc};
use nalgebra as na;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// `R_cam` may carry float noise from upstream tools.
const ROTATION_TOLERANCE: f64 = 1e-3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxRecord {
    #[serde(deserialize_with = "id_string")]
    pub obj_id: String,
    pub category_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center_cam: Option<[f64; 3]>,
    #[serde(rename = "R_cam", default, skip_serializing_if = "Option::is_none")]
    pub r_cam: Option<[[f64; 3]; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<[f64; 3]>,
    #[serde(rename = "bbox3D_cam", default, skip_serializing_if = "Option::is_none")]
    pub bbox3d_cam: Option<Vec<[f64; 3]>>,
}

impl BoxRecord {
    /// Parametric fields win; raw corners are the fallback.
    pub fn to_box(&self) -> AnnotationResult<OrientedBox> {
        match (self.center_cam, self.r_cam, self.dimensions, &self.bbox3d_cam) {
            (Some(center), Some(rows), Some(dimensions), _) => {
                let rotation = RotationMatrix::from_rows(rows);
                if !rotation.is_rotation(ROTATION_TOLERANCE) {
                    return Err(AnnotationError::parse(format!(
                        "R_cam of box {} is not a rotation",
                        self.obj_id
                    )));
                }
                OrientedBox::from_matrix(
                    self.obj_id.clone(),
                    self.category_name.clone(),
                    na::Point3::from(center),
                    na::Vector3::from(dimensions),
                    &rotation,
                )
            }
            (_, _, _, Some(corners)) => {
                let corners: Corners = corners
                    .iter()
                    .map(|&c| na::Point3::from(c))
                    .collect::<Vec<_>>()
                    .try_into()
                    .map_err(|points: Vec<_>| {
                        AnnotationError::parse(format!(
                            "bbox3D_cam must hold 8 corners, got {}",
                            points.len()
                        ))
                    })?;
                OrientedBox::from_corners(
                    self.obj_id.clone(),
                    self.category_name.clone(),
                    &corners,
                )
            }
            _ => Err(AnnotationError::parse(format!(
                "box {} needs center_cam, R_cam and dimensions, or bbox3D_cam",
                self.obj_id
            ))),
        }
    }
}

fn id_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(text) => text,
        RawId::Number(number) => number.to_string(),
    })
}

/// A box that could not be decoded, by position in the source array.
#[derive(Debug)]
pub struct BoxFailure {
    pub index: usize,
    pub obj_id: Option<String>,
    pub error: AnnotationError,
}

#[derive(Debug, Default)]
pub struct DecodedBoxes {
    pub boxes: Vec<OrientedBox>,
    pub failures: Vec<BoxFailure>,
}

/// Decode a box document. Only a document that is not a JSON array fails as
/// a whole; individual bad boxes land in `failures`.
pub fn decode_boxes(json: &str) -> AnnotationResult<DecodedBoxes> {
    let elements: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut decoded = DecodedBoxes::default();

    for (index, element) in elements.into_iter().enumerate() {
        let obj_id = element.get("obj_id").map(|id| match id {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        });
        let result = serde_json::from_value::<BoxRecord>(element)
            .map_err(AnnotationError::from)
            .and_then(|record| record.to_box());

        match result {
            Ok(obb) => decoded.boxes.push(obb),
            Err(error) => {
                warn!(index, ?obj_id, %error, "skipping box");
                decoded.failures.push(BoxFailure {
                    index,
                    obj_id,
                    error,
                });
            }
        }
    }

    Ok(decoded)
}

pub fn encode_boxes<'a>(
    boxes: impl IntoIterator<Item = &'a OrientedBox>,
) -> AnnotationResult<Vec<BoxRecord>> {
    boxes.into_iter().map(OrientedBox::to_record).collect()
}

pub fn to_json(records: &[BoxRecord]) -> AnnotationResult<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Opt-out record written next to a scan that should be skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionMarker {
    pub deleted: bool,
    pub timestamp: DateTime<Utc>,
}

impl DeletionMarker {
    pub fn now() -> Self {
        Self {
            deleted: true,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DOC: &str = r#"[
        {
            "obj_id": "3",
            "category_name": "chair",
            "center_cam": [0.0, 0.0, 5.0],
            "R_cam": [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            "dimensions": [2.0, 1.0, 1.0]
        },
        {
            "obj_id": 4,
            "category_name": "lamp",
            "bbox3D_cam": [
                [-1, -1, -1], [1, -1, -1], [1, 1, -1], [-1, 1, -1],
                [-1, -1, 1], [1, -1, 1], [1, 1, 1], [-1, 1, 1]
            ]
        },
        {
            "obj_id": "5",
            "category_name": "sofa",
            "center_cam": [0.0, 0.0],
            "R_cam": [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
            "dimensions": [1.0, 1.0, 1.0]
        },
        {
            "obj_id": "6",
            "category_name": "bed",
            "bbox3D_cam": [[0, 0, 0], [0, 0, 0], [0, 0, 0], [0, 0, 0],
                           [0, 0, 0], [0, 0, 0], [0, 0, 0], [0, 0, 0]]
        }
    ]"#;

    #[test]
    fn bad_boxes_do_not_abort_the_rest() {
        let decoded = decode_boxes(DOC).unwrap();
        assert_eq!(decoded.boxes.len(), 2);
        assert_eq!(decoded.boxes[1].id, "4");
        assert_relative_eq!(
            decoded.boxes[1].dimensions(),
            na::Vector3::new(2.0, 2.0, 2.0)
        );

        assert_eq!(decoded.failures.len(), 2);
        assert_eq!(decoded.failures[0].index, 2);
        assert!(matches!(
            decoded.failures[0].error,
            AnnotationError::Parse { .. }
        ));
        assert_eq!(decoded.failures[1].obj_id.as_deref(), Some("6"));
        assert!(matches!(
            decoded.failures[1].error,
            AnnotationError::DegenerateGeometry { .. }
        ));
    }

    #[test]
    fn non_array_document_fails() {
        assert!(decode_boxes(r#"{"obj_id": "1"}"#).is_err());
        assert!(decode_boxes("not json").is_err());
    }

    #[test]
    fn missing_geometry_is_a_parse_error() {
        let decoded = decode_boxes(r#"[{"obj_id": "1", "category_name": "cup"}]"#).unwrap();
        assert!(decoded.boxes.is_empty());
        assert!(matches!(
            decoded.failures[0].error,
            AnnotationError::Parse { .. }
        ));
    }

    #[test]
    fn wrong_corner_count_is_a_parse_error() {
        let doc = r#"[{"obj_id": "1", "category_name": "cup", "bbox3D_cam": [[0, 0, 0]]}]"#;
        let decoded = decode_boxes(doc).unwrap();
        assert!(matches!(
            decoded.failures[0].error,
            AnnotationError::Parse { .. }
        ));
    }

    #[test]
    fn skewed_rotation_is_rejected() {
        let doc = r#"[{"obj_id": "1", "category_name": "cup",
            "center_cam": [0, 0, 0], "dimensions": [1, 1, 1],
            "R_cam": [[1, 0.5, 0], [0, 1, 0], [0, 0, 1]]}]"#;
        let decoded = decode_boxes(doc).unwrap();
        assert_eq!(decoded.failures.len(), 1);
    }

    #[test]
    fn reflected_rotation_is_rejected() {
        let doc = r#"[{"obj_id": "1", "category_name": "cup",
            "center_cam": [0, 0, 0], "dimensions": [1, 1, 1],
            "R_cam": [[1, 0, 0], [0, 1, 0], [0, 0, -1]]}]"#;
        let decoded = decode_boxes(doc).unwrap();
        assert!(decoded.boxes.is_empty());
        assert!(matches!(
            decoded.failures[0].error,
            AnnotationError::Parse { .. }
        ));
    }

    #[test]
    fn mirrored_corners_are_rejected() {
        // corners 0-3 and 4-7 swapped: local z points down
        let doc = r#"[{"obj_id": "1", "category_name": "cup", "bbox3D_cam": [
            [-1, -1, 1], [1, -1, 1], [1, 1, 1], [-1, 1, 1],
            [-1, -1, -1], [1, -1, -1], [1, 1, -1], [-1, 1, -1]]}]"#;
        let decoded = decode_boxes(doc).unwrap();
        assert!(decoded.boxes.is_empty());
        assert!(matches!(
            decoded.failures[0].error,
            AnnotationError::MirroredGeometry
        ));
    }

    #[test]
    fn export_writes_every_field() {
        let decoded = decode_boxes(DOC).unwrap();
        let records = encode_boxes(&decoded.boxes).unwrap();
        let json = to_json(&records).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let first = &value[0];
        assert_eq!(first["obj_id"], "3");
        assert_eq!(first["category_name"], "chair");
        assert_eq!(first["R_cam"].as_array().unwrap().len(), 3);
        assert_eq!(first["bbox3D_cam"].as_array().unwrap().len(), 8);
        assert_eq!(first["dimensions"][0].as_f64(), Some(2.0));
    }

    #[test]
    fn deletion_marker_shape() {
        let marker = DeletionMarker::now();
        let value = serde_json::to_value(&marker).unwrap();
        assert_eq!(value["deleted"], true);
        assert!(value["timestamp"].is_string());
    }
}
