// src/backend/cuda/kernels.rs
use crate::backend::CriterionCudaN;
use cudarc::driver::{CudaContext, CudaFunction, CudaStream, LaunchConfig};
use cudarc::nvrtc::{compile_ptx, Ptx};
use std::collections::HashMap;
use std::sync::Arc;

/// PTX produced by build.rs. Empty when nvcc was not available at build time.
const PREBUILT_PTX: &str = include_str!(concat!(env!("OUT_DIR"), "/criterion.ptx"));

/// Kernel source, compiled with NVRTC when no prebuilt PTX exists.
const CRITERION_CU: &str = include_str!("../../../kernels/criterion.cu");

/// Entry points of one kernel as (f32, f64).
pub type KernelVariants = (&'static str, &'static str);

pub const UPDATE_ELEMENT: KernelVariants = ("update_element", "update_element_f64");
pub const ELEMENT_TO_ELEMENT: KernelVariants = ("element_to_element", "element_to_element_f64");

const CRITERION_FUNCTIONS: &[&str] = &[
    UPDATE_ELEMENT.0,
    UPDATE_ELEMENT.1,
    ELEMENT_TO_ELEMENT.0,
    ELEMENT_TO_ELEMENT.1,
];

/// Every criterion kernel runs on exactly one thread.
pub const SINGLE_THREAD: LaunchConfig = LaunchConfig {
    grid_dim: (1, 1, 1),
    block_dim: (1, 1, 1),
    shared_mem_bytes: 0,
};

// Generic kernel launch macro
macro_rules! launch_kernel {
    ($kernels:expr, $kernel_name:expr, $( $arg:expr ),* $(,)? ) => {{
        use cudarc::driver::PushKernelArg;
        let kernel_name: &str = $kernel_name;
        let stream = $kernels.stream();
        let kernel = $kernels
            .function(kernel_name)
            .ok_or_else(|| format!("{} kernel not found", kernel_name))?;

        unsafe {
            stream
                .launch_builder(kernel)
                $( .arg($arg) )*
                .launch($crate::backend::cuda::kernels::SINGLE_THREAD)
                .map_err(|e| format!("Failed to launch {} kernel: {}", kernel_name, e))?;
        }

        Ok::<(), String>(())
    }};
}
pub(crate) use launch_kernel;

/// Entry point of `variants` for element type `T`.
pub fn kernel_name<T: CriterionCudaN>(variants: KernelVariants) -> &'static str {
    match T::DTYPE {
        "f64" => variants.1,
        _ => variants.0,
    }
}

pub struct KernelManager {
    stream: Arc<CudaStream>,
    functions: HashMap<String, CudaFunction>,
}

impl KernelManager {
    pub fn new(stream: Arc<CudaStream>) -> Self {
        Self {
            stream,
            functions: HashMap::new(),
        }
    }

    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }

    pub fn function(&self, name: &str) -> Option<&CudaFunction> {
        self.functions.get(name)
    }
}

/// Loads the criterion kernels into `ctx`.
pub fn load_all_kernels(kernels: &mut KernelManager, ctx: &Arc<CudaContext>) -> Result<(), String> {
    let ptx = if PREBUILT_PTX.trim().is_empty() {
        log::debug!("compiling criterion kernels with NVRTC");
        compile_ptx(CRITERION_CU).map_err(|e| format!("NVRTC compilation failed: {}", e))?
    } else {
        Ptx::from_src(PREBUILT_PTX)
    };

    let module = ctx
        .load_module(ptx)
        .map_err(|e| format!("Failed to load criterion module: {}", e))?;

    for &name in CRITERION_FUNCTIONS {
        let function = module
            .load_function(name)
            .map_err(|e| format!("Failed to load kernel {}: {}", name, e))?;
        kernels.functions.insert(name.to_string(), function);
    }

    Ok(())
}
