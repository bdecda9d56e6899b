pub mod device;
pub mod manager;
pub mod number;
pub mod storage;

#[cfg(feature = "cuda")]
pub mod cuda;
// CUDA backend module

#[cfg(feature = "cuda")]
pub use device::cuda;


pub use device::Device;
pub use device::cpu;
pub use device::default_device;

pub use manager::{BackendManager, get_backend};
#[cfg(feature = "cuda")]
pub use manager::with_cuda_context;

pub use number::{CriterionCudaN, CriterionN};
pub use storage::{CPUStorage, ElementUpdate, StorageBackend};
#[cfg(feature = "cuda")]
pub use storage::CUDAStorage;
