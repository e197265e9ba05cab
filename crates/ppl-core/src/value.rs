//! Dense row-major tensors carried by sites.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, PplError};

/// Realised outcome of a site: a dense row-major `f64` tensor.
///
/// Discrete outcomes (Bernoulli, categorical indices) are stored as whole
/// numbers in `f64`. A scalar has an empty shape and exactly one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Value {
    shape: Vec<usize>,
    data: Vec<f64>,
}

impl Value {
    /// Creates a scalar value.
    pub fn scalar(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    /// Creates a tensor of the given shape with every entry set to `value`.
    pub fn filled(shape: &[usize], value: f64) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![value; shape.iter().product()],
        }
    }

    /// Creates a one dimensional tensor from the provided entries.
    pub fn vector(data: Vec<f64>) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Creates a tensor from raw parts, checking that the sizes agree.
    pub fn from_vec(shape: Vec<usize>, data: Vec<f64>) -> Result<Self, PplError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(PplError::Shape(
                ErrorInfo::new("value-size", "tensor data does not match its shape")
                    .with_context("shape", format!("{shape:?}"))
                    .with_context("len", data.len().to_string()),
            ));
        }
        Ok(Self { shape, data })
    }

    /// Shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of stored entries.
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Flat row-major entries.
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Returns the single entry of a one-element tensor.
    pub fn as_scalar(&self) -> Option<f64> {
        match self.data.as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }

    /// Sum of every entry.
    pub fn sum(&self) -> f64 {
        self.data.iter().sum()
    }

    /// Sums out the `n` rightmost dimensions.
    pub fn sum_rightmost(&self, n: usize) -> Value {
        let n = n.min(self.shape.len());
        if n == 0 {
            return self.clone();
        }
        let keep = self.shape.len() - n;
        let inner: usize = self.shape[keep..].iter().product();
        let shape = self.shape[..keep].to_vec();
        let data = if inner == 0 {
            vec![0.0; shape.iter().product()]
        } else {
            self.data.chunks(inner).map(|chunk| chunk.iter().sum()).collect()
        };
        Value { shape, data }
    }

    /// Applies `f` elementwise.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Value {
        Value {
            shape: self.shape.clone(),
            data: self.data.iter().copied().map(f).collect(),
        }
    }

    /// Multiplies every entry by `factor`.
    pub fn scale(&self, factor: f64) -> Value {
        self.map(|x| x * factor)
    }

    /// Tensor of zeros with the same shape.
    pub fn zeros_like(&self) -> Value {
        Value::filled(&self.shape, 0.0)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::scalar(value)
    }
}
