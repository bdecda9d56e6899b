// src/backend/storage/cuda.rs
use super::{offset_2d, ElementUpdate, StorageBackend};
use crate::backend::cuda::kernels::{kernel_name, launch_kernel, ELEMENT_TO_ELEMENT, UPDATE_ELEMENT};
use crate::backend::cuda::CudaContextManager;
use crate::backend::manager::with_cuda_context;
use crate::backend::CriterionCudaN;
use cudarc::driver::CudaSlice;
use ndarray::ArrayD;
use std::any::Any;
use std::fmt;

/// GPU storage
pub struct CUDAStorage<T: CriterionCudaN> {
    data: CudaSlice<T>,
    shape: Vec<usize>,
}

impl<T: CriterionCudaN> CUDAStorage<T> {
    pub fn new(data: CudaSlice<T>, shape: Vec<usize>) -> Self {
        Self { data, shape }
    }

    pub fn zeros(shape: &[usize]) -> Result<Box<dyn StorageBackend<T>>, String> {
        let len = shape.iter().product();
        let data = with_cuda_context(|ctx: &CudaContextManager| ctx.alloc_zeros::<T>(len))?;
        Ok(Box::new(Self::new(data, shape.to_vec())))
    }

    pub fn full(shape: &[usize], value: T) -> Result<Box<dyn StorageBackend<T>>, String> {
        let host = vec![value; shape.iter().product()];
        Self::from_slice(&host, shape)
    }

    pub fn from_slice(host: &[T], shape: &[usize]) -> Result<Box<dyn StorageBackend<T>>, String> {
        let expected: usize = shape.iter().product();
        if host.len() != expected {
            return Err(format!(
                "Data length {} doesn't match shape {:?} (expected {})",
                host.len(),
                shape,
                expected
            ));
        }
        let data = with_cuda_context(|ctx: &CudaContextManager| ctx.host_to_device(host))?;
        Ok(Box::new(Self::new(data, shape.to_vec())))
    }

    /// Copies the whole buffer back to the host.
    pub fn to_vec(&self) -> Result<Vec<T>, String> {
        with_cuda_context(|ctx: &CudaContextManager| ctx.device_to_host(&self.data))
    }
}

impl<T: CriterionCudaN> fmt::Debug for CUDAStorage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CUDAStorage")
            .field("dtype", &T::DTYPE)
            .field("shape", &self.shape)
            .finish()
    }
}

impl<T> StorageBackend<T> for CUDAStorage<T>
where
    T: CriterionCudaN,
{
    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn is_gpu(&self) -> bool {
        true
    }

    fn cpu_data(&self) -> Result<&ArrayD<T>, String> {
        Err("Data is on GPU. Read it element-wise or copy it with to_vec() first".to_string())
    }

    fn clone_storage(&self) -> Result<Box<dyn StorageBackend<T>>, String> {
        let host = self.to_vec()?;
        Self::from_slice(&host, &self.shape)
    }

    fn element(&self, row: usize, col: usize) -> Result<T, String> {
        let offset = offset_2d(&self.shape, row, col)?;
        with_cuda_context(|ctx: &CudaContextManager| ctx.read_element(&self.data, offset))
    }

    fn update_element(
        &mut self,
        row: usize,
        col: usize,
        value: T,
        mode: ElementUpdate,
    ) -> Result<(), String> {
        let offset = offset_2d(&self.shape, row, col)? as u32;
        let beta = T::from_f64(mode.beta());
        let name = kernel_name::<T>(UPDATE_ELEMENT);
        let data = &mut self.data;
        with_cuda_context(|ctx: &CudaContextManager| {
            launch_kernel!(ctx.kernels(), name, data, &offset, &value, &beta)?;
            ctx.synchronize()
        })
    }

    fn element_to_element(
        &self,
        src_row: usize,
        src_col: usize,
        dst: &mut dyn StorageBackend<f64>,
        dst_row: usize,
        dst_col: usize,
        mode: ElementUpdate,
    ) -> Result<(), String> {
        let src_offset = offset_2d(&self.shape, src_row, src_col)? as u32;

        // Device-resident aggregate: stay on the device
        if let Some(dst_gpu) = dst.as_any_mut().downcast_mut::<CUDAStorage<f64>>() {
            let dst_offset = offset_2d(&dst_gpu.shape, dst_row, dst_col)? as u32;
            let beta = mode.beta();
            let name = kernel_name::<T>(ELEMENT_TO_ELEMENT);
            let src = &self.data;
            let dst_data = &mut dst_gpu.data;
            return with_cuda_context(|ctx: &CudaContextManager| {
                launch_kernel!(
                    ctx.kernels(),
                    name,
                    src,
                    &src_offset,
                    dst_data,
                    &dst_offset,
                    &beta
                )?;
                ctx.synchronize()
            });
        }

        let value = self.element(src_row, src_col)?.to_f64();
        dst.update_element(dst_row, dst_col, value, mode)
    }

    fn fill(&mut self, value: T) -> Result<(), String> {
        let host = vec![value; self.shape.iter().product()];
        self.data = with_cuda_context(|ctx: &CudaContextManager| ctx.host_to_device(&host))?;
        Ok(())
    }
}
