//! Dense row-major tensor
//!
//! A `Tensor` is a flat `Vec<f64>` plus its shape. Layers index into the flat
//! buffer directly, the same way the layer kernels walk `batch × features`
//! buffers, so this type only carries the bookkeeping.

use crate::error::{NnError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Tensor {
    /// Create a tensor from a shape and row-major data.
    ///
    /// Fails with `ShapeMismatch` when `data.len()` is not the product of `shape`.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<f64>) -> Result<Self> {
        let shape = shape.into();
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(NnError::shape_mismatch(
                "tensor data",
                format!("{} elements for shape {:?}", expected, shape),
                format!("{} elements", data.len()),
            ));
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        Self::filled(shape, 0.0)
    }

    pub fn filled(shape: impl Into<Vec<usize>>, value: f64) -> Self {
        let shape = shape.into();
        let len = shape.iter().product();
        Self {
            shape,
            data: vec![value; len],
        }
    }

    /// Build a 2D tensor from equally sized rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, |row| row.len());
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(NnError::shape_mismatch(
                    format!("row {}", i),
                    format!("{} columns", cols),
                    format!("{} columns", row.len()),
                ));
            }
            data.extend_from_slice(row);
        }
        Self::new(vec![rows.len(), cols], data)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Same data viewed under a new shape with the same element count.
    pub fn reshape(&self, shape: impl Into<Vec<usize>>) -> Result<Tensor> {
        Tensor::new(shape, self.data.clone())
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Tensor {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Element-wise product summed, i.e. the Frobenius inner product.
    pub fn dot(&self, other: &Tensor) -> Result<f64> {
        self.expect_same_shape(other, "tensor dot")?;
        Ok(self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum())
    }

    /// In-place `self -= scale * other`.
    pub fn scaled_sub_assign(&mut self, scale: f64, other: &Tensor) -> Result<()> {
        self.expect_same_shape(other, "tensor update")?;
        for (value, delta) in self.data.iter_mut().zip(&other.data) {
            *value -= scale * delta;
        }
        Ok(())
    }

    pub fn expect_same_shape(&self, other: &Tensor, context: &str) -> Result<()> {
        if self.shape != other.shape {
            return Err(NnError::shape_mismatch(
                context,
                self.shape.clone(),
                other.shape.clone(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_element_count() {
        assert!(Tensor::new(vec![2, 3], vec![0.0; 6]).is_ok());
        let err = Tensor::new(vec![2, 3], vec![0.0; 5]).unwrap_err();
        assert!(matches!(err, NnError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_from_rows() {
        let t = Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(t.shape(), &[3, 2]);
        assert_eq!(t.data(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_from_rows_ragged() {
        let result = Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_reshape_keeps_data() {
        let t = Tensor::new(vec![2, 2, 2], (0..8).map(|v| v as f64).collect()).unwrap();
        let r = t.reshape(vec![2, 4]).unwrap();
        assert_eq!(r.shape(), &[2, 4]);
        assert_eq!(r.data(), t.data());
        assert!(t.reshape(vec![3, 3]).is_err());
    }

    #[test]
    fn test_scaled_sub_assign() {
        let mut p = Tensor::new(vec![3], vec![1.0, 2.0, 3.0]).unwrap();
        let g = Tensor::new(vec![3], vec![10.0, 20.0, 30.0]).unwrap();
        p.scaled_sub_assign(0.1, &g).unwrap();
        assert_eq!(p.data(), &[0.0, 0.0, 0.0]);

        let wrong = Tensor::zeros(vec![2]);
        assert!(p.scaled_sub_assign(0.1, &wrong).is_err());
    }

    #[test]
    fn test_dot_and_sum() {
        let a = Tensor::new(vec![2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let b = Tensor::filled(vec![2, 2], 2.0);
        assert_eq!(a.dot(&b).unwrap(), 20.0);
        assert_eq!(a.sum(), 10.0);
    }
}
