// src/backend/manager.rs
#[cfg(feature = "cuda")]
use crate::backend::cuda::CudaContextManager;
#[cfg(feature = "cuda")]
use crate::backend::storage::CUDAStorage;
use crate::backend::storage::{CPUStorage, StorageBackend};
use crate::backend::{CriterionCudaN, Device};
use ndarray::{ArrayD, IxDyn};
use std::sync::OnceLock;

/// Decides where storage can live and creates it there.
pub struct BackendManager {
    #[cfg(feature = "cuda")]
    cuda_backend: Option<CudaContextManager>,
}

impl Default for BackendManager {
    fn default() -> Self {
        Self::init()
    }
}

impl BackendManager {
    /// A CPU-only manager, never probes for a GPU.
    pub fn new() -> Self {
        Self {
            #[cfg(feature = "cuda")]
            cuda_backend: None,
        }
    }

    pub fn init() -> Self {
        #[cfg(not(feature = "cuda"))]
        {
            log::debug!("CUDA feature not enabled, using CPU only");
            Self::new()
        }

        #[cfg(feature = "cuda")]
        {
            let mut manager = Self::new();
            match CudaContextManager::new() {
                Ok(cuda_backend) => {
                    log::debug!("CUDA backend initialized on {}", cuda_backend.name());
                    manager.cuda_backend = Some(cuda_backend);
                }
                Err(e) => log::debug!("CUDA backend not available, using CPU only: {}", e),
            }
            manager
        }
    }

    pub fn has_cuda(&self) -> bool {
        #[cfg(feature = "cuda")]
        {
            self.cuda_backend.is_some()
        }
        #[cfg(not(feature = "cuda"))]
        {
            false
        }
    }

    #[cfg(feature = "cuda")]
    pub fn cuda_backend(&self) -> Option<&CudaContextManager> {
        self.cuda_backend.as_ref()
    }

    pub fn best_device(&self) -> Device {
        #[cfg(feature = "cuda")]
        {
            if let Some(backend) = &self.cuda_backend {
                return Device::CUDA(backend.id());
            }
        }
        Device::CPU
    }

    /// Validate device is available and return it
    pub fn validate_device(&self, device: Device) -> Result<Device, String> {
        match device {
            Device::CPU => Ok(device),
            #[cfg(feature = "cuda")]
            Device::CUDA(id) => match &self.cuda_backend {
                Some(backend) if backend.id() == id => Ok(device),
                Some(backend) => Err(format!(
                    "CUDA device {} requested but the backend runs on device {}",
                    id,
                    backend.id()
                )),
                None => Err("CUDA device requested but CUDA not available".to_string()),
            },
        }
    }

    /// Create zero-filled storage on `device`
    pub fn create_storage<T: CriterionCudaN>(
        &self,
        shape: &[usize],
        device: Device,
    ) -> Result<(Device, Box<dyn StorageBackend<T>>), String> {
        let validated_device = self.validate_device(device)?;

        let storage: Box<dyn StorageBackend<T>> = match validated_device {
            Device::CPU => CPUStorage::<T>::zeros(shape)?,
            #[cfg(feature = "cuda")]
            Device::CUDA(_) => CUDAStorage::<T>::zeros(shape)?,
        };

        Ok((validated_device, storage))
    }

    /// Create storage filled with `value` on `device`
    pub fn create_full_storage<T: CriterionCudaN>(
        &self,
        shape: &[usize],
        device: Device,
        value: T,
    ) -> Result<(Device, Box<dyn StorageBackend<T>>), String> {
        let validated_device = self.validate_device(device)?;

        let storage: Box<dyn StorageBackend<T>> = match validated_device {
            Device::CPU => CPUStorage::<T>::full(shape, value)?,
            #[cfg(feature = "cuda")]
            Device::CUDA(_) => CUDAStorage::<T>::full(shape, value)?,
        };

        Ok((validated_device, storage))
    }

    /// Create storage on `device` from host data laid out row-major in `shape`
    pub fn create_storage_from_data<T: CriterionCudaN>(
        &self,
        data: Vec<T>,
        shape: &[usize],
        device: Device,
    ) -> Result<(Device, Box<dyn StorageBackend<T>>), String> {
        let validated_device = self.validate_device(device)?;

        let storage: Box<dyn StorageBackend<T>> = match validated_device {
            Device::CPU => {
                let array = ArrayD::from_shape_vec(IxDyn(shape), data)
                    .map_err(|e| format!("Failed to create CPU array: {}", e))?;
                Box::new(CPUStorage::new(array))
            }
            #[cfg(feature = "cuda")]
            Device::CUDA(_) => CUDAStorage::<T>::from_slice(&data, shape)?,
        };

        Ok((validated_device, storage))
    }
}

// Global instance
static BACKEND: OnceLock<BackendManager> = OnceLock::new();

pub fn get_backend() -> &'static BackendManager {
    BACKEND.get_or_init(BackendManager::init)
}

/// Runs `f` against the global CUDA context.
#[cfg(feature = "cuda")]
pub fn with_cuda_context<F, R>(f: F) -> Result<R, String>
where
    F: FnOnce(&CudaContextManager) -> Result<R, String>,
{
    let context_manager = get_backend()
        .cuda_backend()
        .ok_or("CUDA backend not available")?;
    f(context_manager)
}
