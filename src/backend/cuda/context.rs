// src/backend/cuda/context.rs
use super::kernels::{load_all_kernels, KernelManager};
use crate::backend::CriterionCudaN;
use cudarc::driver::{CudaContext, CudaSlice, CudaStream};
use std::sync::Arc;

/// Owns the CUDA context, the stream every criterion transfer and kernel runs on,
/// and the loaded criterion kernels.
pub struct CudaContextManager {
    ctx: Arc<CudaContext>,
    device: usize,
    kernels: KernelManager,
}

impl CudaContextManager {
    pub fn new() -> Result<Self, String> {
        Self::from_device_id(0)
    }

    pub fn from_device_id(device: usize) -> Result<Self, String> {
        let ctx = CudaContext::new(device).map_err(|e| format!("CUDA init error: {}", e))?;
        let mut kernels = KernelManager::new(ctx.default_stream());
        load_all_kernels(&mut kernels, &ctx)?;

        Ok(Self {
            ctx,
            device,
            kernels,
        })
    }

    pub fn id(&self) -> usize {
        self.device
    }

    pub fn name(&self) -> String {
        self.ctx
            .name()
            .unwrap_or_else(|_| format!("CUDA device {}", self.device))
    }

    pub fn stream(&self) -> &Arc<CudaStream> {
        self.kernels.stream()
    }

    pub fn kernels(&self) -> &KernelManager {
        &self.kernels
    }

    pub fn synchronize(&self) -> Result<(), String> {
        self.stream()
            .synchronize()
            .map_err(|e| format!("CUDA synchronize failed: {}", e))
    }

    // ============= GPU MEMORY MANAGEMENT =============

    pub fn alloc_zeros<T: CriterionCudaN>(&self, len: usize) -> Result<CudaSlice<T>, String> {
        self.stream()
            .alloc_zeros::<T>(len)
            .map_err(|e| format!("CUDA allocation of {} elements failed: {}", len, e))
    }

    /// Synchronous host to device transfer
    pub fn host_to_device<T: CriterionCudaN>(&self, data: &[T]) -> Result<CudaSlice<T>, String> {
        let slice = self
            .stream()
            .memcpy_stod(data)
            .map_err(|e| format!("Host to device transfer failed: {}", e))?;
        self.synchronize()?;
        Ok(slice)
    }

    /// Synchronous device to host transfer
    pub fn device_to_host<T: CriterionCudaN>(&self, data: &CudaSlice<T>) -> Result<Vec<T>, String> {
        let host = self
            .stream()
            .memcpy_dtov(data)
            .map_err(|e| format!("Device to host transfer failed: {}", e))?;
        self.synchronize()?;
        Ok(host)
    }

    /// Copies the single element at `offset` back to the host.
    /// This is the synchronization point of every criterion read.
    pub fn read_element<T: CriterionCudaN>(
        &self,
        data: &CudaSlice<T>,
        offset: usize,
    ) -> Result<T, String> {
        let view = data.slice(offset..offset + 1);
        let mut host = [T::default()];
        self.stream()
            .memcpy_dtoh(&view, &mut host)
            .map_err(|e| format!("Device to host element transfer failed: {}", e))?;
        self.synchronize()?;
        Ok(host[0])
    }
}
