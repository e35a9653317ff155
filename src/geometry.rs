//! # Survey box geometry
//!
//! Everything needed to place a survey into a periodic Cartesian box:
//!
//! * [`CartesianExtent`] – running per-axis min/max, fed chunk by chunk and merged across
//!   workers.
//! * [`resolve_box`] – derives the box size (inferred with padding, or user supplied) and the
//!   centering offset from a global extent.
//! * [`GlobalGeometry`] – the write-once bundle `(BoxSize, Offset, n̄(z))` the coordinator
//!   broadcasts to every worker.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::nbar::NbarCurve;

/// Per-axis bounding values of a set of Cartesian positions.
///
/// The default value is the empty extent (`+∞` minima, `−∞` maxima), the identity of
/// [`CartesianExtent::merge`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CartesianExtent {
    pub min: Vector3<f64>,
    pub max: Vector3<f64>,
}

impl Default for CartesianExtent {
    fn default() -> Self {
        CartesianExtent {
            min: Vector3::repeat(f64::INFINITY),
            max: Vector3::repeat(f64::NEG_INFINITY),
        }
    }
}

impl CartesianExtent {
    /// Widen the extent to cover `positions`. An empty slice leaves it untouched.
    pub fn update(&mut self, positions: &[Vector3<f64>]) {
        for p in positions {
            self.min = self.min.inf(p);
            self.max = self.max.sup(p);
        }
    }

    /// Element-wise min of minima and max of maxima.
    pub fn merge(self, other: CartesianExtent) -> CartesianExtent {
        CartesianExtent {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|i| self.min[i] > self.max[i])
    }

    /// `|max − min|` per axis.
    pub fn delta(&self) -> Vector3<f64> {
        (self.max - self.min).abs()
    }

    pub fn center(&self) -> Vector3<f64> {
        0.5 * (self.min + self.max)
    }
}

/// Derive `(BoxSize, Offset)` from the global extent.
///
/// Arguments
/// -----------------
/// * `extent`: global min/max corners of the data.
/// * `box_size`: user supplied box size, if any.
/// * `box_pad`: fractional padding used when the box size is inferred.
///
/// Return
/// ----------
/// * `Offset = (min + max) / 2`.
/// * `BoxSize = trunc(|max − min| · (1 + box_pad))` per axis when inferred; the integer
///   size keeps downstream meshes aligned. A supplied size is returned unchanged, with a
///   warning for each axis smaller than the observed extent.
pub fn resolve_box(
    extent: &CartesianExtent,
    box_size: Option<Vector3<f64>>,
    box_pad: f64,
) -> (Vector3<f64>, Vector3<f64>) {
    let delta = extent.delta();
    let offset = extent.center();

    let box_size = match box_size {
        None => (delta * (1.0 + box_pad)).map(f64::trunc),
        Some(size) => {
            for (i, (l, d)) in size.iter().zip(delta.iter()).enumerate() {
                if l < d {
                    warn!(
                        "input BoxSize of {l:.2} in dimension {i} smaller than \
                         coordinate range of data ({d:.2})"
                    );
                }
            }
            size
        }
    };
    (box_size, offset)
}

/// Global survey parameters, computed once on the coordinator and broadcast verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalGeometry {
    pub box_size: Vector3<f64>,
    pub offset: Vector3<f64>,
    pub nbar: NbarCurve,
}
