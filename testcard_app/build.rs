// Compiles the GLSL shaders in ../shaders to SPIR-V with glslc.
// Skipped with a warning when no Vulkan SDK is available, so the
// workspace still builds on machines without one.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

fn find_glslc() -> Option<PathBuf> {
    if let Ok(sdk) = env::var("VULKAN_SDK") {
        let candidate = if cfg!(target_os = "windows") {
            Path::new(&sdk).join("Bin").join("glslc.exe")
        } else {
            Path::new(&sdk).join("bin").join("glslc")
        };
        if candidate.exists() {
            return Some(candidate);
        }
    }
    // Fall back to glslc on PATH.
    let probe = Command::new("glslc").arg("--version").status();
    if matches!(probe, Ok(status) if status.success()) {
        return Some(PathBuf::from("glslc"));
    }
    None
}

fn main() {
    println!("cargo:rerun-if-changed=../shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");

    if env::var("SKIP_SHADERS").is_ok() {
        eprintln!("info: skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let Some(glslc) = find_glslc() else {
        eprintln!("warning: glslc not found, shader compilation skipped");
        eprintln!("hint: install the Vulkan SDK or set VULKAN_SDK");
        return;
    };

    let shader_dir = Path::new("../shaders");
    let entries = match std::fs::read_dir(shader_dir) {
        Ok(entries) => entries,
        Err(err) => {
            eprintln!("warning: cannot read {shader_dir:?}: {err}");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        if !matches!(ext, "vert" | "frag" | "comp") {
            continue;
        }
        let Some(stem) = path.file_stem() else {
            continue;
        };
        let out_file = shader_dir.join(stem).with_extension("spv");

        let status = Command::new(&glslc).arg(&path).arg("-o").arg(&out_file).status();
        match status {
            Ok(s) if s.success() => {
                eprintln!("info: compiled {path:?} -> {out_file:?}");
            }
            Ok(s) => {
                eprintln!("error: glslc exited with {} for {path:?}", s.code().unwrap_or(-1));
                panic!("shader compilation failed");
            }
            Err(err) => {
                eprintln!("error: failed to run glslc: {err}");
                panic!("shader compiler not executable");
            }
        }
    }
}
