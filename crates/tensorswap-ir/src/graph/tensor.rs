//! Tensors flowing along data edges, and their static shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Static shape of a tensor.
///
/// The rank itself may be unknown (`None`), and each dimension of a known
/// rank may be unknown as well. Serialized as `null` or as a list such as
/// `[32, null, 128]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TensorShape(Option<Vec<Option<usize>>>);

impl TensorShape {
    /// A shape whose rank is not known.
    pub fn unknown() -> Self {
        TensorShape(None)
    }

    /// A fully known shape.
    pub fn known(dims: &[usize]) -> Self {
        TensorShape(Some(dims.iter().copied().map(Some).collect()))
    }

    /// A shape of known rank with possibly unknown dimensions.
    pub fn partial(dims: Vec<Option<usize>>) -> Self {
        TensorShape(Some(dims))
    }

    pub fn scalar() -> Self {
        TensorShape(Some(Vec::new()))
    }

    /// Number of dimensions, or `None` when the rank is unknown.
    pub fn ndims(&self) -> Option<usize> {
        self.0.as_ref().map(Vec::len)
    }

    pub fn dims(&self) -> Option<&[Option<usize>]> {
        self.0.as_deref()
    }

    /// Total element count when every dimension is known.
    pub fn num_elements(&self) -> Option<usize> {
        self.0
            .as_ref()?
            .iter()
            .try_fold(1usize, |acc, d| d.map(|d| acc.saturating_mul(d)))
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            None => write!(f, "<unknown>"),
            Some(dims) => {
                write!(f, "(")?;
                for (i, d) in dims.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match d {
                        Some(d) => write!(f, "{}", d)?,
                        None => write!(f, "?")?,
                    }
                }
                write!(f, ")")
            }
        }
    }
}

/// Output slot of a node: the place where a tensor is produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outlet {
    pub node: usize,
    pub slot: usize,
}

impl Outlet {
    pub fn new(node: usize, slot: usize) -> Self {
        Outlet { node, slot }
    }
}

/// A tensor in the dataflow graph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TensorInfo {
    pub name: String,
    #[serde(default)]
    pub shape: TensorShape,
    /// Producing node and output slot. `None` until a node claims the tensor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<Outlet>,
}

impl TensorInfo {
    pub fn new(name: impl Into<String>, shape: TensorShape) -> Self {
        TensorInfo {
            name: name.into(),
            shape,
            producer: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ndims() {
        assert_eq!(TensorShape::unknown().ndims(), None);
        assert_eq!(TensorShape::scalar().ndims(), Some(0));
        assert_eq!(TensorShape::known(&[4, 8]).ndims(), Some(2));
        assert_eq!(TensorShape::partial(vec![None, Some(3)]).ndims(), Some(2));
    }

    #[test]
    fn test_num_elements() {
        assert_eq!(TensorShape::known(&[4, 8]).num_elements(), Some(32));
        assert_eq!(TensorShape::scalar().num_elements(), Some(1));
        assert_eq!(TensorShape::partial(vec![None, Some(3)]).num_elements(), None);
        assert_eq!(TensorShape::unknown().num_elements(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(TensorShape::known(&[2, 3]).to_string(), "(2, 3)");
        assert_eq!(
            TensorShape::partial(vec![None, Some(3)]).to_string(),
            "(?, 3)"
        );
        assert_eq!(TensorShape::unknown().to_string(), "<unknown>");
    }

    #[test]
    fn test_shape_serde() {
        let shape = TensorShape::partial(vec![Some(32), None]);
        let json = serde_json::to_string(&shape).unwrap();
        assert_eq!(json, "[32,null]");
        let back: TensorShape = serde_json::from_str(&json).unwrap();
        assert_eq!(back, shape);

        let unknown: TensorShape = serde_json::from_str("null").unwrap();
        assert_eq!(unknown.ndims(), None);
    }
}
