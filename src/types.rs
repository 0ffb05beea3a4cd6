use crate::error::AnnotationError;
use nalgebra as na;
use std::{fmt, str::FromStr};

/// The 8 world-space corners of a box, in the fixed index order of [`CORNER_SIGNS`].
pub type Corners = [na::Point3<f64>; 8];

/// Sign of each half-extent per corner. Index order defines edge topology.
pub const CORNER_SIGNS: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

/// Index of the corner diagonally across the box.
pub const OPPOSITE_CORNER: [usize; 8] = [6, 7, 4, 5, 2, 3, 0, 1];

/// Bottom face, top face, then the four verticals.
pub const EDGES: [(usize, usize); 12] = [
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 0),
    (4, 5),
    (5, 6),
    (6, 7),
    (7, 4),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    pub fn unit(self) -> na::Unit<na::Vector3<f64>> {
        match self {
            Axis::X => na::Vector3::x_axis(),
            Axis::Y => na::Vector3::y_axis(),
            Axis::Z => na::Vector3::z_axis(),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        };
        f.write_str(name)
    }
}

impl FromStr for Axis {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "x" | "X" => Ok(Axis::X),
            "y" | "Y" => Ok(Axis::Y),
            "z" | "Z" => Ok(Axis::Z),
            other => Err(AnnotationError::parse(format!("unknown axis `{other}`"))),
        }
    }
}

/// Intrinsic rotation angles in radians, applied as `Rz(z) * Ry(y) * Rx(x)`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EulerAngles {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl EulerAngles {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A single edit on one box, expressed in the box's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EditCommand {
    Rotate { axis: Axis, angle: f64 },
    Translate { axis: Axis, distance: f64 },
    Resize { axis: Axis, delta: f64 },
}

// Accepts `rotate:z:0.1`, `translate:x:-1`, `resize:y:0.05`.
impl FromStr for EditCommand {
    type Err = AnnotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(kind), Some(axis), Some(amount), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(AnnotationError::parse(format!(
                "expected `<rotate|translate|resize>:<axis>:<amount>`, got `{s}`"
            )));
        };
        let axis: Axis = axis.parse()?;
        let amount: f64 = amount
            .trim()
            .parse()
            .map_err(|err| AnnotationError::parse(format!("bad amount `{amount}`: {err}")))?;

        match kind.trim() {
            "rotate" | "r" => Ok(EditCommand::Rotate {
                axis,
                angle: amount,
            }),
            "translate" | "c" => Ok(EditCommand::Translate {
                axis,
                distance: amount,
            }),
            "resize" | "d" => Ok(EditCommand::Resize {
                axis,
                delta: amount,
            }),
            other => Err(AnnotationError::parse(format!("unknown edit `{other}`"))),
        }
    }
}
