// src/backend/cuda/mod.rs
pub mod context;
pub mod kernels;

pub use context::CudaContextManager;
pub use kernels::{load_all_kernels, KernelManager};
