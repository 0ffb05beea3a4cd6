//! Oriented 3D bounding box annotations: decode stored boxes, edit them in
//! their own local frame, and write the corrected boxes back.
//!
//! A box is kept as center, dimensions and Euler angles
//! (`R = Rz(z) * Ry(y) * Rx(x)`); its 8 corners are derived after every edit
//! and are the source for everything that gets persisted.
//!
//! ```
//! use bbox3d_annotator::{Axis, EulerAngles, OrientedBox};
//! use nalgebra as na;
//!
//! let mut obb = OrientedBox::new(
//!     "1",
//!     "chair",
//!     na::Point3::new(0.0, 0.0, 5.0),
//!     na::Vector3::new(2.0, 1.0, 1.0),
//!     EulerAngles::default(),
//! )
//! .unwrap();
//! obb.rotate_local(Axis::Z, std::f64::consts::FRAC_PI_2);
//! obb.translate_local(Axis::X, 1.0);
//! assert!((obb.center().y - 1.0).abs() < 1e-9);
//! ```

pub mod config;
mod error;
pub mod input;
pub mod loader;
mod obb;
pub mod pointcloud;
pub mod record;
mod rotation;
pub mod session;
pub mod store;
mod types;

pub use crate::config::EditorConfig;
pub use crate::error::{AnnotationError, AnnotationResult};
pub use crate::obb::{frame_from_corners, OrientedBox, StorageFrame, DEFAULT_MIN_DIMENSION};
pub use crate::rotation::RotationMatrix;
pub use crate::session::{AnnotationSession, BoxOverlay};
pub use crate::types::{Axis, Corners, EditCommand, EulerAngles, CORNER_SIGNS, EDGES};
