use crate::error::{AnnotationError, AnnotationResult};
use itertools::{Itertools, MinMaxResult};
use nalgebra as na;
use noisy_float::prelude::*;
use ply_rs::{
    parser::Parser,
    ply::{DefaultElement, Property},
};
use tracing::{debug, warn};

/// Scan points in the camera frame. Read-only with respect to box geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<na::Point3<f64>>,
    /// Per-point RGB, present only when every vertex carries colour.
    pub colors: Option<Vec<[u8; 3]>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointCloudStats {
    pub count: usize,
    pub min: na::Point3<f64>,
    pub max: na::Point3<f64>,
}

impl PointCloud {
    /// Parse an ASCII or binary PLY buffer.
    pub fn from_ply(bytes: &[u8]) -> AnnotationResult<Self> {
        let mut reader = bytes;
        let parser = Parser::<DefaultElement>::new();
        let ply = parser
            .read_ply(&mut reader)
            .map_err(|err| AnnotationError::parse(format!("invalid PLY: {err}")))?;

        let Some(vertices) = ply.payload.get("vertex") else {
            return Err(AnnotationError::parse("PLY has no vertex element"));
        };

        let mut points = Vec::with_capacity(vertices.len());
        let mut colors = Vec::with_capacity(vertices.len());
        let mut has_colors = true;
        let mut dropped = 0usize;

        for vertex in vertices {
            let (Some(x), Some(y), Some(z)) = (
                scalar(vertex, "x"),
                scalar(vertex, "y"),
                scalar(vertex, "z"),
            ) else {
                return Err(AnnotationError::parse("PLY vertex without x, y, z"));
            };
            if !(x.is_finite() && y.is_finite() && z.is_finite()) {
                dropped += 1;
                continue;
            }
            points.push(na::Point3::new(x, y, z));

            match (
                channel(vertex, "red"),
                channel(vertex, "green"),
                channel(vertex, "blue"),
            ) {
                (Some(r), Some(g), Some(b)) => colors.push([r, g, b]),
                _ => has_colors = false,
            }
        }

        if dropped > 0 {
            warn!(dropped, "dropped non-finite points");
        }
        debug!(points = points.len(), has_colors, "parsed point cloud");

        Ok(Self {
            points,
            colors: has_colors.then_some(colors),
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point count and axis-aligned bounds; `None` for an empty cloud.
    pub fn stats(&self) -> Option<PointCloudStats> {
        let range = |coord: fn(&na::Point3<f64>) -> f64| {
            match self.points.iter().map(coord).map(r64).minmax() {
                MinMaxResult::NoElements => None,
                MinMaxResult::OneElement(v) => Some((v.raw(), v.raw())),
                MinMaxResult::MinMax(lo, hi) => Some((lo.raw(), hi.raw())),
            }
        };

        let (x_min, x_max) = range(|p| p.x)?;
        let (y_min, y_max) = range(|p| p.y)?;
        let (z_min, z_max) = range(|p| p.z)?;

        Some(PointCloudStats {
            count: self.points.len(),
            min: na::Point3::new(x_min, y_min, z_min),
            max: na::Point3::new(x_max, y_max, z_max),
        })
    }
}

fn scalar(element: &DefaultElement, key: &str) -> Option<f64> {
    match element.get(key)? {
        Property::Float(v) => Some(f64::from(*v)),
        Property::Double(v) => Some(*v),
        _ => None,
    }
}

fn channel(element: &DefaultElement, key: &str) -> Option<u8> {
    match element.get(key)? {
        Property::UChar(v) => Some(*v),
        _ => None,
    }
}
