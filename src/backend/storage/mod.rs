mod cpu;
#[cfg(feature = "cuda")]
mod cuda;

pub use cpu::CPUStorage;
#[cfg(feature = "cuda")]
pub use cuda::CUDAStorage;

use crate::backend::CriterionCudaN;

use ndarray::ArrayD;
use std::any::Any;
use std::fmt::Debug;

/// How a single element is written into its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementUpdate {
    /// Overwrite the destination element
    Assign,
    /// Add into the destination element
    Add,
}

impl ElementUpdate {
    /// Scaling applied to the previous destination value: 0 overwrites, 1 accumulates.
    pub fn beta(self) -> f64 {
        match self {
            ElementUpdate::Assign => 0.0,
            ElementUpdate::Add => 1.0,
        }
    }
}

/// Trait for the memory spaces criterion values and aggregates can live in.
/// Element accessors may block on a device transfer.
pub trait StorageBackend<T>: Debug + Any
where
    T: CriterionCudaN,
{
    /// Storage shape
    fn shape(&self) -> &[usize];

    // Downcasting hooks for backend-specific fast paths
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Get number of dimensions
    fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Get total number of elements
    fn size(&self) -> usize {
        self.shape().iter().product()
    }

    /// Check if storage is on GPU
    fn is_gpu(&self) -> bool;

    /// Get CPU data if available (fails for GPU storage)
    fn cpu_data(&self) -> Result<&ArrayD<T>, String>;

    fn clone_storage(&self) -> Result<Box<dyn StorageBackend<T>>, String>;

    /// Reads element (row, col) of a 2D storage.
    /// GPU storage synchronizes and copies that one element back to the host.
    fn element(&self, row: usize, col: usize) -> Result<T, String>;

    /// Writes a host scalar into element (row, col).
    fn update_element(
        &mut self,
        row: usize,
        col: usize,
        value: T,
        mode: ElementUpdate,
    ) -> Result<(), String>;

    /// Moves element (src_row, src_col) of `self` into (dst_row, dst_col) of `dst`,
    /// promoting it to f64. The default goes through the host.
    fn element_to_element(
        &self,
        src_row: usize,
        src_col: usize,
        dst: &mut dyn StorageBackend<f64>,
        dst_row: usize,
        dst_col: usize,
        mode: ElementUpdate,
    ) -> Result<(), String> {
        let value = self.element(src_row, src_col)?.to_f64();
        dst.update_element(dst_row, dst_col, value, mode)
    }

    /// Sets every element to `value`.
    fn fill(&mut self, value: T) -> Result<(), String>;
}

/// Row-major offset of (row, col) in a 2D shape, with bounds checking.
pub(crate) fn offset_2d(shape: &[usize], row: usize, col: usize) -> Result<usize, String> {
    if shape.len() != 2 {
        return Err(format!(
            "Element access requires a 2D storage, got shape {:?}",
            shape
        ));
    }
    if row >= shape[0] || col >= shape[1] {
        return Err(format!(
            "Element ({}, {}) is out of bounds for shape {:?}",
            row, col, shape
        ));
    }
    Ok(row * shape[1] + col)
}
