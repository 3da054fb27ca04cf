//! Search-box geometry.

use serde::{Deserialize, Serialize};

use crate::error::{FerrodockError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxGeometry {
    pub center: [f64; 3],
    pub size: [f64; 3],
}

impl BoxGeometry {
    pub fn new(center: [f64; 3], size: [f64; 3]) -> Self {
        Self { center, size }
    }

    pub fn validate(&self) -> Result<()> {
        if self.center.iter().chain(self.size.iter()).any(|v| !v.is_finite()) {
            return Err(FerrodockError::Config("box geometry must be finite".into()));
        }
        if self.size.iter().any(|&s| s <= 0.0) {
            return Err(FerrodockError::Config(format!(
                "box size must be positive on every axis, got {:?}",
                self.size
            )));
        }
        Ok(())
    }
}

/// Axis-aligned coordinate extents of a structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Extents {
    /// Extents of a point cloud; `None` when there are no points.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f64; 3]>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut extents = Extents { min: first, max: first };
        for p in iter {
            for axis in 0..3 {
                extents.min[axis] = extents.min[axis].min(p[axis]);
                extents.max[axis] = extents.max[axis].max(p[axis]);
            }
        }
        Some(extents)
    }
}

/// Box sizing rule for [`compute_box`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoxSizing {
    /// Extent on each axis plus this padding.
    Padding(f64),
    /// The same edge length on every axis, used verbatim.
    Fixed(f64),
}

impl BoxSizing {
    /// A fixed size wins over padding when both are given.
    pub fn from_options(padding: f64, fixed: Option<f64>) -> Self {
        match fixed {
            Some(size) => BoxSizing::Fixed(size),
            None => BoxSizing::Padding(padding),
        }
    }
}

/// Center is the midpoint of the extents; size follows `sizing`.
pub fn compute_box(extents: &Extents, sizing: BoxSizing) -> BoxGeometry {
    let mut center = [0.0; 3];
    let mut size = [0.0; 3];
    for axis in 0..3 {
        center[axis] = (extents.min[axis] + extents.max[axis]) / 2.0;
        size[axis] = match sizing {
            BoxSizing::Padding(padding) => extents.max[axis] - extents.min[axis] + padding,
            BoxSizing::Fixed(fixed) => fixed,
        };
    }
    BoxGeometry { center, size }
}
