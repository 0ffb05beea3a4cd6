use crate::{
    error::{AnnotationError, AnnotationResult},
    record::BoxRecord,
    rotation::RotationMatrix,
    types::{Axis, Corners, EditCommand, EulerAngles, CORNER_SIGNS, EDGES, OPPOSITE_CORNER},
};
use nalgebra as na;

/// Default lower bound for any box dimension after an edit.
pub const DEFAULT_MIN_DIMENSION: f64 = 1e-3;

/// Edges shorter than this cannot define a local axis.
const DEGENERATE_EDGE: f64 = 1e-9;

/// Center, full edge lengths and orientation, as persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StorageFrame {
    pub center: na::Point3<f64>,
    pub dimensions: na::Vector3<f64>,
    pub rotation: RotationMatrix,
}

/// One annotated box. Geometry fields are private so the cached corners can
/// never drift from center, dimensions and rotation.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientedBox {
    pub id: String,
    pub category: String,
    center: na::Point3<f64>,
    dimensions: na::Vector3<f64>,
    rotation: EulerAngles,
    corners: Corners,
}

impl OrientedBox {
    pub fn new(
        id: impl Into<String>,
        category: impl Into<String>,
        center: na::Point3<f64>,
        dimensions: na::Vector3<f64>,
        rotation: EulerAngles,
    ) -> AnnotationResult<Self> {
        if !center.iter().all(|v| v.is_finite()) {
            return Err(AnnotationError::parse("center must be finite"));
        }
        if !dimensions.iter().all(|&d| d.is_finite() && d > 0.0) {
            return Err(AnnotationError::parse(format!(
                "dimensions must be positive, got [{}, {}, {}]",
                dimensions.x, dimensions.y, dimensions.z
            )));
        }
        if ![rotation.x, rotation.y, rotation.z].iter().all(|a| a.is_finite()) {
            return Err(AnnotationError::parse("rotation angles must be finite"));
        }

        let corners = compute_corners(&center, &dimensions, rotation);
        Ok(Self {
            id: id.into(),
            category: category.into(),
            center,
            dimensions,
            rotation,
            corners,
        })
    }

    pub fn from_matrix(
        id: impl Into<String>,
        category: impl Into<String>,
        center: na::Point3<f64>,
        dimensions: na::Vector3<f64>,
        rotation: &RotationMatrix,
    ) -> AnnotationResult<Self> {
        Self::new(id, category, center, dimensions, rotation.to_euler())
    }

    /// Rebuild a box from its 8 corners in the fixed index order.
    pub fn from_corners(
        id: impl Into<String>,
        category: impl Into<String>,
        corners: &Corners,
    ) -> AnnotationResult<Self> {
        let frame = frame_from_corners(corners)?;
        Self::new(
            id,
            category,
            frame.center,
            frame.dimensions,
            frame.rotation.to_euler(),
        )
    }

    pub fn center(&self) -> na::Point3<f64> {
        self.center
    }

    /// Full edge lengths (length, height, width) along local x, y, z.
    pub fn dimensions(&self) -> na::Vector3<f64> {
        self.dimensions
    }

    pub fn rotation(&self) -> EulerAngles {
        self.rotation
    }

    pub fn rotation_matrix(&self) -> RotationMatrix {
        RotationMatrix::from_euler(self.rotation)
    }

    pub fn orientation(&self) -> na::UnitQuaternion<f64> {
        na::UnitQuaternion::from_euler_angles(self.rotation.x, self.rotation.y, self.rotation.z)
    }

    pub fn corners(&self) -> &Corners {
        &self.corners
    }

    pub fn edges(&self) -> &'static [(usize, usize); 12] {
        &EDGES
    }

    /// Center, dimensions and rotation re-derived from the current corners.
    pub fn storage_frame(&self) -> AnnotationResult<StorageFrame> {
        frame_from_corners(&self.corners)
    }

    pub fn to_record(&self) -> AnnotationResult<BoxRecord> {
        let frame = self.storage_frame()?;
        Ok(BoxRecord {
            obj_id: self.id.clone(),
            category_name: self.category.clone(),
            center_cam: Some(frame.center.coords.into()),
            r_cam: Some(frame.rotation.to_rows()),
            dimensions: Some(frame.dimensions.into()),
            bbox3d_cam: Some(self.corners.iter().map(|p| p.coords.into()).collect()),
        })
    }

    pub fn apply(&mut self, command: EditCommand, min_dimension: f64) {
        match command {
            EditCommand::Rotate { axis, angle } => self.rotate_local(axis, angle),
            EditCommand::Translate { axis, distance } => self.translate_local(axis, distance),
            EditCommand::Resize { axis, delta } => self.resize(axis, delta, min_dimension),
        }
    }

    /// Rotate about the box's own axis: `q_new = q_old * q_delta`.
    pub fn rotate_local(&mut self, axis: Axis, angle: f64) {
        let delta = na::UnitQuaternion::from_axis_angle(&axis.unit(), angle);
        let orientation = self.orientation() * delta;
        self.rotation = RotationMatrix::from_quaternion(&orientation).to_euler();
        self.refresh();
    }

    /// Move the center along the box's own axis.
    pub fn translate_local(&mut self, axis: Axis, distance: f64) {
        let offset = self.orientation() * (axis.unit().into_inner() * distance);
        self.center += offset;
        self.refresh();
    }

    pub fn resize(&mut self, axis: Axis, delta: f64, min_dimension: f64) {
        let i = axis.index();
        self.dimensions[i] = (self.dimensions[i] + delta).max(min_dimension);
        self.refresh();
    }

    /// Drag one corner towards `target` while its opposite corner stays put.
    ///
    /// The box keeps its orientation; the target is projected onto the local
    /// axes, so the result is always a rigid box.
    pub fn drag_corner(
        &mut self,
        index: usize,
        target: na::Point3<f64>,
        min_dimension: f64,
    ) -> AnnotationResult<()> {
        if index >= CORNER_SIGNS.len() {
            return Err(AnnotationError::Validation(format!(
                "corner index {index} out of range"
            )));
        }
        if !target.iter().all(|v| v.is_finite()) {
            return Err(AnnotationError::Validation(
                "corner target must be finite".to_string(),
            ));
        }

        let anchor = self.corners[OPPOSITE_CORNER[index]];
        let rotation = self.rotation_matrix();
        let local = rotation.matrix().transpose() * (target - anchor);
        let signs = na::Vector3::from(CORNER_SIGNS[index]);

        let dimensions = signs.component_mul(&local).map(|d| d.max(min_dimension));
        let half_offset = signs.component_mul(&dimensions) / 2.0;

        self.dimensions = dimensions;
        self.center = anchor + &rotation * half_offset;
        self.refresh();
        Ok(())
    }

    /// Replace the geometry from raw corners; leaves the box untouched on error.
    pub fn set_corners(&mut self, corners: &Corners) -> AnnotationResult<()> {
        let frame = frame_from_corners(corners)?;
        self.center = frame.center;
        self.dimensions = frame.dimensions;
        self.rotation = frame.rotation.to_euler();
        self.refresh();
        Ok(())
    }

    fn refresh(&mut self) {
        self.corners = compute_corners(&self.center, &self.dimensions, self.rotation);
    }
}

fn compute_corners(
    center: &na::Point3<f64>,
    dimensions: &na::Vector3<f64>,
    rotation: EulerAngles,
) -> Corners {
    let half = dimensions / 2.0;
    let rotation = RotationMatrix::from_euler(rotation);
    CORNER_SIGNS.map(|signs| {
        let local = na::Vector3::from(signs).component_mul(&half);
        center + &rotation * local
    })
}

/// Derive center, edge lengths and local axes from corners 0, 1, 3 and 4.
///
/// No re-orthonormalization: skewed input yields a skewed matrix. Corners in
/// mirror order are rejected.
pub fn frame_from_corners(corners: &Corners) -> AnnotationResult<StorageFrame> {
    let center = na::Point3::from(
        corners
            .iter()
            .map(|p| p.coords)
            .sum::<na::Vector3<f64>>()
            / 8.0,
    );

    let origin = corners[0];
    let edges = [corners[1] - origin, corners[3] - origin, corners[4] - origin];
    let lengths = edges.map(|edge| edge.norm());

    for (axis, length) in Axis::ALL.into_iter().zip(lengths) {
        // also rejects NaN
        if !(length > DEGENERATE_EDGE) {
            return Err(AnnotationError::DegenerateGeometry { axis });
        }
    }

    let [x, y, z] = edges;
    let rotation = RotationMatrix::from_columns(x / lengths[0], y / lengths[1], z / lengths[2]);
    if !(rotation.matrix().determinant() > 0.0) {
        return Err(AnnotationError::MirroredGeometry);
    }
    Ok(StorageFrame {
        center,
        dimensions: na::Vector3::from(lengths),
        rotation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn sample() -> OrientedBox {
        OrientedBox::new(
            "1",
            "chair",
            na::Point3::new(0.0, 0.0, 5.0),
            na::Vector3::new(2.0, 1.0, 1.0),
            EulerAngles::default(),
        )
        .unwrap()
    }

    #[test]
    fn corners_follow_fixed_order() {
        let obb = sample();
        assert_relative_eq!(obb.corners()[0], na::Point3::new(-1.0, -0.5, 4.5));
        assert_relative_eq!(obb.corners()[1], na::Point3::new(1.0, -0.5, 4.5));
        assert_relative_eq!(obb.corners()[3], na::Point3::new(-1.0, 0.5, 4.5));
        assert_relative_eq!(obb.corners()[4], na::Point3::new(-1.0, -0.5, 5.5));
        assert_relative_eq!(obb.corners()[6], na::Point3::new(1.0, 0.5, 5.5));
    }

    #[test]
    fn rejects_non_positive_dimensions() {
        let result = OrientedBox::new(
            "1",
            "chair",
            na::Point3::origin(),
            na::Vector3::new(1.0, 0.0, 1.0),
            EulerAngles::default(),
        );
        assert!(matches!(result, Err(AnnotationError::Parse { .. })));
    }

    #[test]
    fn quarter_turn_then_local_translation() {
        let mut obb = sample();
        obb.rotate_local(Axis::Z, FRAC_PI_2);
        assert_relative_eq!(obb.center(), na::Point3::new(0.0, 0.0, 5.0), epsilon = 1e-12);
        assert_relative_eq!(obb.corners()[0], na::Point3::new(0.5, -1.0, 4.5), epsilon = 1e-9);

        obb.translate_local(Axis::X, 1.0);
        assert_relative_eq!(obb.center(), na::Point3::new(0.0, 1.0, 5.0), epsilon = 1e-9);
    }

    #[test]
    fn local_rotation_is_not_world_rotation() {
        // Tilt about local x first; a local y turn then spins about the tilted axis.
        let mut obb = sample();
        obb.rotate_local(Axis::X, FRAC_PI_2);
        obb.rotate_local(Axis::Y, FRAC_PI_2);

        let local_z = obb.rotation_matrix().column(2);
        assert_relative_eq!(local_z, na::Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn resize_clamps_to_floor() {
        let mut obb = sample();
        obb.resize(Axis::Y, -5.0, DEFAULT_MIN_DIMENSION);
        assert_relative_eq!(obb.dimensions().y, DEFAULT_MIN_DIMENSION);
        obb.apply(
            EditCommand::Resize {
                axis: Axis::X,
                delta: 0.5,
            },
            DEFAULT_MIN_DIMENSION,
        );
        assert_relative_eq!(obb.dimensions().x, 2.5);
    }

    #[test]
    fn storage_frame_matches_parameters() {
        let obb = OrientedBox::new(
            "7",
            "table",
            na::Point3::new(1.0, -2.0, 3.0),
            na::Vector3::new(0.4, 1.2, 2.0),
            EulerAngles::new(0.1, -0.4, 1.3),
        )
        .unwrap();
        let frame = obb.storage_frame().unwrap();
        assert_relative_eq!(frame.center, obb.center(), epsilon = 1e-9);
        assert_relative_eq!(frame.dimensions, obb.dimensions(), epsilon = 1e-9);
        assert_relative_eq!(
            *frame.rotation.matrix(),
            *obb.rotation_matrix().matrix(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn degenerate_corners_are_reported() {
        let corners = [na::Point3::new(1.0, 1.0, 1.0); 8];
        let err = OrientedBox::from_corners("x", "y", &corners).unwrap_err();
        assert!(matches!(
            err,
            AnnotationError::DegenerateGeometry { axis: Axis::X }
        ));
    }

    #[test]
    fn drag_corner_keeps_opposite_fixed() {
        let mut obb = sample();
        let anchor = obb.corners()[0];
        obb.drag_corner(6, na::Point3::new(2.0, 1.0, 6.0), DEFAULT_MIN_DIMENSION)
            .unwrap();

        assert_relative_eq!(obb.corners()[0], anchor, epsilon = 1e-12);
        assert_relative_eq!(obb.corners()[6], na::Point3::new(2.0, 1.0, 6.0), epsilon = 1e-12);
        assert_relative_eq!(obb.dimensions(), na::Vector3::new(3.0, 1.5, 1.5), epsilon = 1e-12);
        assert_relative_eq!(obb.center(), na::Point3::new(0.5, 0.25, 5.25), epsilon = 1e-12);
    }

    #[test]
    fn drag_past_anchor_clamps() {
        let mut obb = sample();
        obb.drag_corner(1, na::Point3::new(-3.0, -0.5, 4.5), 0.01).unwrap();
        assert_relative_eq!(obb.dimensions().x, 0.01);
        assert!(obb.drag_corner(8, na::Point3::origin(), 0.01).is_err());
    }

    #[test]
    fn set_corners_failure_leaves_box_unchanged() {
        let mut obb = sample();
        let before = obb.clone();
        assert!(obb.set_corners(&[na::Point3::origin(); 8]).is_err());
        assert_eq!(obb, before);
    }

    #[test]
    fn mirrored_corners_leave_box_unchanged() {
        let mut obb = sample();
        let before = obb.clone();
        let mut mirrored = *obb.corners();
        mirrored.swap(0, 1);
        mirrored.swap(2, 3);
        mirrored.swap(4, 5);
        mirrored.swap(6, 7);
        assert!(matches!(
            obb.set_corners(&mirrored),
            Err(AnnotationError::MirroredGeometry)
        ));
        assert_eq!(obb, before);
    }
}
