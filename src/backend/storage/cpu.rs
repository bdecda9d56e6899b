// src/backend/storage/cpu.rs
use super::{offset_2d, ElementUpdate, StorageBackend};
use crate::backend::CriterionCudaN;
use ndarray::{ArrayD, IxDyn};
use std::any::Any;

#[derive(Debug, Clone)]
pub struct CPUStorage<T: Clone> {
    data: ArrayD<T>,
}

impl<T: Clone> CPUStorage<T> {
    pub fn new(data: ArrayD<T>) -> Self {
        Self { data }
    }

    pub fn array_ref(&self) -> &ArrayD<T> {
        &self.data
    }
}

impl<T> CPUStorage<T>
where
    T: CriterionCudaN,
{
    pub fn zeros(shape: &[usize]) -> Result<Box<dyn StorageBackend<T>>, String> {
        Ok(Box::new(Self::new(ArrayD::zeros(IxDyn(shape)))))
    }

    pub fn full(shape: &[usize], value: T) -> Result<Box<dyn StorageBackend<T>>, String> {
        Ok(Box::new(Self::new(ArrayD::from_elem(IxDyn(shape), value))))
    }

    /// A `[1 x 1]` storage holding `value`.
    pub fn scalar(value: T) -> Self {
        Self::new(ArrayD::from_elem(IxDyn(&[1, 1]), value))
    }
}

impl<T> StorageBackend<T> for CPUStorage<T>
where
    T: CriterionCudaN,
{
    fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn is_gpu(&self) -> bool {
        false
    }

    fn cpu_data(&self) -> Result<&ArrayD<T>, String> {
        Ok(&self.data)
    }

    fn clone_storage(&self) -> Result<Box<dyn StorageBackend<T>>, String> {
        Ok(Box::new(self.clone()))
    }

    fn element(&self, row: usize, col: usize) -> Result<T, String> {
        offset_2d(self.shape(), row, col)?;
        Ok(self.data[IxDyn(&[row, col])])
    }

    fn update_element(
        &mut self,
        row: usize,
        col: usize,
        value: T,
        mode: ElementUpdate,
    ) -> Result<(), String> {
        offset_2d(self.shape(), row, col)?;
        let slot = &mut self.data[IxDyn(&[row, col])];
        match mode {
            ElementUpdate::Assign => *slot = value,
            ElementUpdate::Add => *slot += value,
        }
        Ok(())
    }

    fn fill(&mut self, value: T) -> Result<(), String> {
        self.data.fill(value);
        Ok(())
    }
}
