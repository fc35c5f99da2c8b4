// SPDX-License-Identifier: Apache-2.0
//! Dynamic loading of a real engine shared library.
//!
//! The engine exports a narrow C contract:
//!
//! ```text
//! maestro_simulator_create      () -> handle
//! maestro_simulator_destroy     (handle)
//! maestro_simulator_configure   (handle, num_qubits, sim_type, variant, passes, max_bond_dim) -> status
//! maestro_simulator_execute     (handle, program, config_json) -> result text (owned by engine)
//! maestro_simulator_free_result (text)
//! ```
//!
//! Every result pointer returned by `execute` must be released through the
//! paired `free_result` call; [`DynamicBackend`] copies the text into a
//! `String` and frees the engine's buffer before returning.

use std::ffi::{c_char, c_void, CStr, CString};
use std::path::Path;

use libloading::{Library, Symbol};

use crate::backend::{BackendConfig, BackendLoader, SimulatorBackend};
use crate::error::{Result, SimError};

type FnCreate = unsafe extern "C" fn() -> *mut c_void;
type FnDestroy = unsafe extern "C" fn(*mut c_void);
type FnConfigure = unsafe extern "C" fn(*mut c_void, usize, u32, u32, u32, u64) -> i32;
type FnExecute = unsafe extern "C" fn(*mut c_void, *const c_char, *const c_char) -> *mut c_char;
type FnFreeResult = unsafe extern "C" fn(*mut c_char);

/// A loaded engine with all function pointers resolved.
///
/// The library handle is kept alive for the lifetime of this struct so the
/// loaded `.so` is not unloaded while we still hold function pointers into it.
pub struct DynamicBackend {
    /// Prevent the shared library from being unloaded.
    _library: Library,

    /// Path the library was loaded from (for diagnostics).
    library_path: String,

    handle: *mut c_void,

    fn_destroy: FnDestroy,
    fn_configure: FnConfigure,
    fn_execute: FnExecute,
    fn_free_result: FnFreeResult,
}

// SAFETY: the engine handle is owned exclusively by this struct, and the
// scheduler drives one backend from one worker thread at a time.
unsafe impl Send for DynamicBackend {}

impl DynamicBackend {
    /// Load an engine shared library and create an engine instance.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::LoadFailed`] if `dlopen` fails, or
    /// [`SimError::SymbolNotFound`] if a required symbol cannot be resolved.
    pub fn load(path: &Path) -> Result<Self> {
        let path_str = path.display().to_string();

        // SAFETY: we are loading an external shared library. The caller is
        // responsible for ensuring the library is trustworthy.
        let library = unsafe { Library::new(path) }.map_err(|e| SimError::LoadFailed {
            path: path_str.clone(),
            cause: e.to_string(),
        })?;

        tracing::info!("loaded engine library '{path_str}'");

        let fn_create = resolve::<FnCreate>(&library, "maestro_simulator_create")?;
        let fn_destroy = resolve::<FnDestroy>(&library, "maestro_simulator_destroy")?;
        let fn_configure = resolve::<FnConfigure>(&library, "maestro_simulator_configure")?;
        let fn_execute = resolve::<FnExecute>(&library, "maestro_simulator_execute")?;
        let fn_free_result = resolve::<FnFreeResult>(&library, "maestro_simulator_free_result")?;

        // SAFETY: create takes no arguments and returns an opaque handle.
        let handle = unsafe { fn_create() };
        if handle.is_null() {
            return Err(SimError::LoadFailed {
                path: path_str,
                cause: "engine create returned null".into(),
            });
        }

        tracing::debug!("engine instance created");

        Ok(Self {
            _library: library,
            library_path: path_str,
            handle,
            fn_destroy,
            fn_configure,
            fn_execute,
            fn_free_result,
        })
    }

    /// Filesystem path the library was loaded from.
    pub fn library_path(&self) -> &str {
        &self.library_path
    }
}

impl SimulatorBackend for DynamicBackend {
    fn configure(&mut self, config: &BackendConfig) -> Result<()> {
        let (variant, passes) = config.exec.as_raw();
        // SAFETY: handle is valid until Drop; the function pointer matches
        // the exported signature.
        let ret = unsafe {
            (self.fn_configure)(
                self.handle,
                config.num_qubits,
                config.sim_type,
                variant,
                passes,
                config.max_bond_dim.unwrap_or(0),
            )
        };
        if ret != 0 {
            return Err(SimError::Configure(format!(
                "engine returned code {ret} for {config:?}"
            )));
        }
        Ok(())
    }

    fn execute(&mut self, program: &str, config_json: &str) -> Result<String> {
        let program = CString::new(program)
            .map_err(|e| SimError::Execute(format!("program contains NUL byte: {e}")))?;
        let config = CString::new(config_json)
            .map_err(|e| SimError::Execute(format!("config contains NUL byte: {e}")))?;

        // SAFETY: both pointers are valid NUL-terminated strings for the
        // duration of the call; the engine returns an owned buffer.
        let raw = unsafe { (self.fn_execute)(self.handle, program.as_ptr(), config.as_ptr()) };
        if raw.is_null() {
            return Err(SimError::Execute("engine returned null result".into()));
        }

        // SAFETY: raw is a NUL-terminated buffer owned by the engine; copy
        // it out, then release it through the paired free call.
        let text = unsafe { CStr::from_ptr(raw) }
            .to_str()
            .map(str::to_owned)
            .map_err(|e| SimError::InvalidResult(format!("invalid UTF-8: {e}")));
        unsafe { (self.fn_free_result)(raw) };

        text
    }
}

impl Drop for DynamicBackend {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            // SAFETY: handle was produced by create and is destroyed once.
            unsafe { (self.fn_destroy)(self.handle) };
            tracing::debug!("engine instance destroyed");
        }
    }
}

impl std::fmt::Debug for DynamicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicBackend")
            .field("library_path", &self.library_path)
            .finish_non_exhaustive()
    }
}

/// Loads a [`DynamicBackend`] from a fixed library path.
#[derive(Debug, Clone)]
pub struct DynamicLoader {
    path: std::path::PathBuf,
}

impl DynamicLoader {
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BackendLoader for DynamicLoader {
    fn load(&self) -> Result<Box<dyn SimulatorBackend>> {
        Ok(Box::new(DynamicBackend::load(&self.path)?))
    }
}

// ---------------------------------------------------------------------------
// Symbol resolution
// ---------------------------------------------------------------------------

fn resolve<T: Copy>(library: &Library, name: &str) -> Result<T> {
    tracing::trace!("resolving engine symbol '{name}'");

    // SAFETY: the caller guarantees the type `T` matches the actual function
    // signature exported by the library. This is the core FFI contract.
    unsafe {
        let sym: Symbol<T> = library
            .get(name.as_bytes())
            .map_err(|e| SimError::SymbolNotFound {
                symbol: name.to_string(),
                cause: e.to_string(),
            })?;
        Ok(*sym)
    }
}
