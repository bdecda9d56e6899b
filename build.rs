// build.rs
// Precompiles the criterion CUDA kernels to PTX when building with the cuda feature.
// Without nvcc an empty PTX file is emitted and the kernels are compiled at runtime through NVRTC.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=kernels/");
    println!("cargo:rerun-if-changed=build.rs");

    // Build scripts see enabled features through the environment, not through cfg!.
    if env::var_os("CARGO_FEATURE_CUDA").is_some() {
        compile_cuda_kernels();
    }
}

fn compile_cuda_kernels() {
    let manifest_dir = env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR is set by cargo");
    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));

    let cu_file = Path::new(&manifest_dir).join("kernels").join("criterion.cu");
    let ptx_file = out_dir.join("criterion.ptx");

    if !check_nvcc_available() {
        println!("cargo:warning=nvcc not found. Criterion kernels will be compiled at runtime with NVRTC.");
        write_empty_ptx(&ptx_file);
        return;
    }

    let output = Command::new("nvcc")
        .arg("-ptx")
        .arg("-O3")
        .arg("-arch=sm_70")
        .arg(&cu_file)
        .arg("-o")
        .arg(&ptx_file)
        .output();

    match output {
        Ok(result) if result.status.success() => {
            fix_ptx_version(&ptx_file);
        }
        Ok(result) => {
            println!(
                "cargo:warning=Failed to compile {}: {}",
                cu_file.display(),
                String::from_utf8_lossy(&result.stderr)
            );
            write_empty_ptx(&ptx_file);
        }
        Err(e) => {
            println!("cargo:warning=Error compiling {}: {}", cu_file.display(), e);
            write_empty_ptx(&ptx_file);
        }
    }
}

fn check_nvcc_available() -> bool {
    Command::new("nvcc")
        .arg("--version")
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

fn write_empty_ptx(ptx_file: &Path) {
    if let Err(e) = std::fs::write(ptx_file, "") {
        println!("cargo:warning=Failed to write {}: {}", ptx_file.display(), e);
    }
}

fn fix_ptx_version(ptx_file: &Path) {
    // Older drivers reject PTX 8.5
    if let Ok(content) = std::fs::read_to_string(ptx_file) {
        let fixed_content = content.replace("version 8.5", "version 7.5");
        if let Err(e) = std::fs::write(ptx_file, fixed_content) {
            println!(
                "cargo:warning=Failed to fix PTX version for {}: {}",
                ptx_file.display(),
                e
            );
        }
    }
}
