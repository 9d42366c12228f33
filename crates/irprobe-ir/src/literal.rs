//! Constant array values.

use crate::error::IrError;
use crate::types::{ElementType, Shape};

/// A dense constant array.
///
/// Values are stored as `f64` regardless of element type; integer and
/// predicate types are kept normalized (truncated, or `0.0`/`1.0`).
#[derive(Clone, Debug, PartialEq)]
pub struct Literal {
    pub element_type: ElementType,
    pub dims: Vec<i64>,
    pub values: Vec<f64>,
}

impl Literal {
    /// Creates a literal, checking that the value count matches the dims.
    pub fn new(
        element_type: ElementType,
        dims: impl Into<Vec<i64>>,
        values: Vec<f64>,
    ) -> Result<Self, IrError> {
        let dims = dims.into();
        if dims.iter().any(|&d| d < 0) {
            return Err(IrError::InvalidLiteral(format!(
                "negative dimension in {dims:?}"
            )));
        }
        let expected = dims
            .iter()
            .try_fold(1i64, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| IrError::InvalidLiteral(format!("dimensions {dims:?} overflow")))?;
        if expected != values.len() as i64 {
            return Err(IrError::InvalidLiteral(format!(
                "{} values for dimensions {dims:?} (expected {expected})",
                values.len()
            )));
        }
        let values = values
            .into_iter()
            .map(|v| normalize(element_type, v))
            .collect();
        Ok(Self {
            element_type,
            dims,
            values,
        })
    }

    /// A rank-0 literal.
    pub fn scalar(element_type: ElementType, value: f64) -> Self {
        Self {
            element_type,
            dims: Vec::new(),
            values: vec![normalize(element_type, value)],
        }
    }

    /// An array with every element set to `value`.
    pub fn splat(element_type: ElementType, dims: impl Into<Vec<i64>>, value: f64) -> Self {
        let dims = dims.into();
        let count: i64 = dims.iter().product();
        Self {
            element_type,
            values: vec![normalize(element_type, value); count.max(0) as usize],
            dims,
        }
    }

    /// The shape of this literal, without layout.
    pub fn shape(&self) -> Shape {
        Shape::array(self.element_type, self.dims.clone())
    }

    /// Returns `true` if every element equals `value`.
    pub fn is_all(&self, value: f64) -> bool {
        self.values.iter().all(|&v| v == value)
    }

    /// The values converted to integers, for shape and permutation operands.
    pub fn to_i64_vec(&self) -> Vec<i64> {
        self.values.iter().map(|&v| v as i64).collect()
    }

    /// Converts to another element type.
    pub fn convert(&self, element_type: ElementType) -> Self {
        Self {
            element_type,
            dims: self.dims.clone(),
            values: self
                .values
                .iter()
                .map(|&v| normalize(element_type, v))
                .collect(),
        }
    }

    /// The same values under new dimensions with an equal element count.
    pub fn reshape(&self, dims: &[i64]) -> Option<Self> {
        let count: i64 = dims.iter().product();
        (count == self.values.len() as i64).then(|| Self {
            element_type: self.element_type,
            dims: dims.to_vec(),
            values: self.values.clone(),
        })
    }
}

fn normalize(element_type: ElementType, v: f64) -> f64 {
    match element_type {
        ElementType::Pred => {
            if v != 0.0 {
                1.0
            } else {
                0.0
            }
        }
        t if t.is_floating() => v,
        _ => v.trunc(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_value_count() {
        assert!(Literal::new(ElementType::F32, [2, 2], vec![1.0; 4]).is_ok());
        let err = Literal::new(ElementType::F32, [2, 2], vec![1.0; 3]).unwrap_err();
        assert!(err.to_string().contains("expected 4"));
        assert!(Literal::new(ElementType::F32, [-1], vec![]).is_err());
    }

    #[test]
    fn integer_values_truncate() {
        let lit = Literal::new(ElementType::S32, [3], vec![1.7, -2.5, 3.0]).unwrap();
        assert_eq!(lit.values, vec![1.0, -2.0, 3.0]);
        assert_eq!(lit.to_i64_vec(), vec![1, -2, 3]);
    }

    #[test]
    fn pred_values_normalize() {
        let lit = Literal::new(ElementType::Pred, [2], vec![0.0, 5.0]).unwrap();
        assert_eq!(lit.values, vec![0.0, 1.0]);
    }

    #[test]
    fn convert_and_reshape() {
        let lit = Literal::new(ElementType::F32, [2, 2], vec![0.5, 1.5, 2.5, 3.5]).unwrap();
        let ints = lit.convert(ElementType::S32);
        assert_eq!(ints.values, vec![0.0, 1.0, 2.0, 3.0]);
        let flat = lit.reshape(&[4]).unwrap();
        assert_eq!(flat.dims, vec![4]);
        assert!(lit.reshape(&[3]).is_none());
    }

    #[test]
    fn splat_fills() {
        let zeros = Literal::splat(ElementType::F32, [2, 3], 0.0);
        assert_eq!(zeros.values.len(), 6);
        assert!(zeros.is_all(0.0));
        assert_eq!(Literal::scalar(ElementType::F32, 1.0).shape().dims(), &[] as &[i64]);
    }
}
