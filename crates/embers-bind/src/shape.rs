use std::fmt::Display;

use itertools::Itertools;

use crate::error::{
    CallShapeError,
    InvalidMapping,
};

/// Dimension extents. An extent is `None` while it's unknown, e.g. for an
/// output that is only allocated once the call shape is known.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<Option<usize>>,
}

impl Shape {
    pub fn new(dims: impl IntoIterator<Item = usize>) -> Self {
        Self {
            dims: dims.into_iter().map(Some).collect(),
        }
    }

    pub fn from_dims(dims: Vec<Option<usize>>) -> Self {
        Self { dims }
    }

    pub fn unknown(rank: usize) -> Self {
        Self {
            dims: vec![None; rank],
        }
    }

    pub fn scalar() -> Self {
        Self::default()
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn dims(&self) -> &[Option<usize>] {
        &self.dims
    }

    pub fn get(&self, axis: usize) -> Option<usize> {
        self.dims.get(axis).copied().flatten()
    }

    pub fn is_concrete(&self) -> bool {
        self.dims.iter().all(Option::is_some)
    }

    pub fn concrete(&self) -> Option<Vec<usize>> {
        self.dims.iter().copied().collect()
    }

    pub fn concat(&self, other: &Shape) -> Shape {
        Shape {
            dims: self.dims.iter().chain(&other.dims).copied().collect(),
        }
    }

    /// Drops the first `n` dimensions.
    pub fn skip(&self, n: usize) -> Shape {
        Shape {
            dims: self.dims.iter().skip(n).copied().collect(),
        }
    }

    /// Keeps only the last `n` dimensions.
    pub fn tail(&self, n: usize) -> Shape {
        self.skip(self.rank().saturating_sub(n))
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dims = self
            .dims
            .iter()
            .map(|d| d.map(|d| d.to_string()).unwrap_or_else(|| "?".to_owned()))
            .join(",");
        write!(f, "({dims})")
    }
}

impl<const D: usize> From<[usize; D]> for Shape {
    fn from(value: [usize; D]) -> Self {
        Self::new(value)
    }
}

/// Assigns each local dimension of an argument to an axis of the call shape.
///
/// An unset mapping is invalid until it's finalized with
/// [`VectorMapping::right_aligned`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct VectorMapping {
    axes: Option<Vec<usize>>,
}

impl VectorMapping {
    pub fn unset() -> Self {
        Self::default()
    }

    /// Creates an explicit mapping for an argument of rank `rank`.
    pub fn explicit(
        path: &str,
        axes: impl Into<Vec<usize>>,
        rank: usize,
    ) -> Result<Self, InvalidMapping> {
        let axes = axes.into();

        let error = |reason: String| {
            InvalidMapping {
                path: path.to_owned(),
                mapping: axes.clone(),
                reason,
            }
        };

        if axes.len() > rank {
            return Err(error(format!(
                "mapping has {} entries, but the argument only has {rank} dimensions",
                axes.len()
            )));
        }
        if !axes.iter().all_unique() {
            return Err(error("all call axes must be assigned at most once".to_owned()));
        }

        Ok(Self { axes: Some(axes) })
    }

    /// The default mapping: a node needing `dims` dimensions in a call with
    /// `call_dimensionality` dimensions gets the trailing call axes, as in
    /// numpy broadcasting.
    pub fn right_aligned(call_dimensionality: usize, dims: usize) -> Self {
        assert!(dims <= call_dimensionality);
        Self {
            axes: Some((call_dimensionality - dims..call_dimensionality).collect()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.axes.is_some()
    }

    pub fn axes(&self) -> Option<&[usize]> {
        self.axes.as_deref()
    }

    pub fn len(&self) -> usize {
        self.axes.as_ref().map(Vec::len).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of call dimensions this mapping requires.
    pub fn call_dimensionality(&self) -> Option<usize> {
        self.axes
            .as_ref()
            .map(|axes| axes.iter().max().map(|max| max + 1).unwrap_or_default())
    }

    /// Evaluates the mapping for a call coordinate.
    pub fn apply(&self, call_id: &[usize]) -> Option<Vec<usize>> {
        self.axes
            .as_ref()?
            .iter()
            .map(|&axis| call_id.get(axis).copied())
            .collect()
    }
}

impl Display for VectorMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.axes {
            Some(axes) => write!(f, "({})", axes.iter().join(",")),
            None => write!(f, "(unset)"),
        }
    }
}

/// Accumulates the call shape from the container extents of all arguments.
///
/// An extent of 1 broadcasts against any other extent, unknown extents don't
/// constrain the call shape.
#[derive(Clone, Debug)]
pub struct CallShapeBuilder {
    dims: Vec<Option<usize>>,
}

impl CallShapeBuilder {
    pub fn new(call_dimensionality: usize) -> Self {
        Self {
            dims: vec![None; call_dimensionality],
        }
    }

    pub fn add(
        &mut self,
        path: &str,
        shape: &Shape,
        mapping: &[usize],
    ) -> Result<(), CallShapeError> {
        for (local, &axis) in mapping.iter().enumerate() {
            let Some(extent) = shape.get(local)
            else {
                continue;
            };
            let current = &mut self.dims[axis];

            match *current {
                None | Some(1) => *current = Some(extent),
                Some(expected) if expected == extent || extent == 1 => {}
                Some(expected) => {
                    return Err(CallShapeError::Mismatch {
                        path: path.to_owned(),
                        axis,
                        extent,
                        expected,
                    });
                }
            }
        }

        Ok(())
    }

    pub fn build(self) -> Result<Shape, CallShapeError> {
        if let Some(axis) = self.dims.iter().position(Option::is_none) {
            Err(CallShapeError::Unresolved { axis })
        }
        else {
            Ok(Shape::from_dims(self.dims))
        }
    }
}
