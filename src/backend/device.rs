use serde::{Deserialize, Serialize};
// src/backend/device.rs

/// Memory space an accumulator's totals (and a criterion's value) live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Device {
    #[default]
    CPU,
    #[cfg(feature = "cuda")]
    CUDA(usize), // Device ID for multi-GPU systems
}

impl Device {
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::CPU)
    }

    pub fn is_cuda(&self) -> bool {
        match self {
            Device::CPU => false,
            #[cfg(feature = "cuda")]
            Device::CUDA(_) => true,
        }
    }

    // Get device ID for CUDA devices
    pub fn device_id(&self) -> Option<usize> {
        match self {
            Device::CPU => None,
            #[cfg(feature = "cuda")]
            Device::CUDA(id) => Some(*id),
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::CPU => write!(f, "CPU"),
            #[cfg(feature = "cuda")]
            Device::CUDA(id) => write!(f, "CUDA:{}", id),
        }
    }
}

pub fn cpu() -> Device {
    Device::CPU
}

#[cfg(feature = "cuda")]
pub fn cuda(device_id: usize) -> Device {
    Device::CUDA(device_id)
}

/// Best device this build can place criteria on.
/// With the cuda feature this probes the backend and falls back to CPU when no GPU is present.
pub fn default_device() -> Device {
    crate::backend::manager::get_backend().best_device()
}
