use super::{answer_prefix, PowSolver};
use crate::util::errors::{DeeptermError, DeeptermResult};
use async_trait::async_trait;
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use wasmtime::{Engine, Instance, Memory, Module, Store, TypedFunc};

/// Allocator export names used by different wasm-bindgen versions.
const ALLOCATOR_EXPORTS: [&str; 3] = ["__wbindgen_malloc", "__wbindgen_export_0", "malloc"];
const STACK_POINTER_EXPORTS: [&str; 2] = ["__wbindgen_add_to_stack_pointer", "add_to_stack_pointer"];
const SOLVE_EXPORT: &str = "wasm_solve";
/// `i32` found flag at offset 0, `f64` answer at offset 8.
const RETURN_SLOT_SIZE: i32 = 16;

enum ModuleSource {
    Path(PathBuf),
    Bytes(Arc<[u8]>),
}

impl ModuleSource {
    fn describe(&self) -> String {
        match self {
            ModuleSource::Path(path) => path.display().to_string(),
            ModuleSource::Bytes(bytes) => format!("<{} bytes in memory>", bytes.len()),
        }
    }
}

/// Runs the upstream's `wasm_solve` search module under wasmtime.
///
/// The module is compiled on first use and shared by every later call, with
/// concurrent first callers waiting on the same initialization. Each call then
/// instantiates it into its own store, so no mutable solver state is shared and
/// all per-call memory is dropped when the call returns.
pub struct WasmPowSolver {
    source: ModuleSource,
    engine: Engine,
    module: OnceCell<Module>,
}

struct SearchOutcome {
    found: bool,
    answer: f64,
}

impl WasmPowSolver {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self::with_source(ModuleSource::Path(path.into()))
    }

    /// Accepts a binary module, or text format for tests.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::with_source(ModuleSource::Bytes(bytes.into().into()))
    }

    fn with_source(source: ModuleSource) -> Self {
        Self {
            source,
            engine: Engine::default(),
            module: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.module.initialized()
    }

    async fn module(&self) -> DeeptermResult<Module> {
        let module = self
            .module
            .get_or_try_init(|| async {
                let bytes: Arc<[u8]> = match &self.source {
                    ModuleSource::Path(path) => tokio::fs::read(path)
                        .await
                        .map_err(|e| {
                            DeeptermError::Solver(format!(
                                "WASM file not found at {}: {}",
                                path.display(),
                                e
                            ))
                        })?
                        .into(),
                    ModuleSource::Bytes(bytes) => Arc::clone(bytes),
                };

                let engine = self.engine.clone();
                let module = tokio::task::spawn_blocking(move || Module::new(&engine, &bytes[..]))
                    .await
                    .map_err(|e| DeeptermError::Solver(format!("WASM compile task failed: {}", e)))?
                    .map_err(|e| {
                        DeeptermError::Solver(format!("Failed to initialize WASM: {:#}", e))
                    })?;

                info!("PoW module compiled: source={}", self.source.describe());
                Ok::<Module, DeeptermError>(module)
            })
            .await?;
        Ok(module.clone())
    }
}

#[async_trait]
impl PowSolver for WasmPowSolver {
    async fn solve(
        &self,
        challenge: &str,
        salt: &str,
        expire_at: i64,
        difficulty: f64,
    ) -> DeeptermResult<u64> {
        let module = self.module().await?;
        let engine = self.engine.clone();
        let challenge = challenge.to_string();
        let prefix = answer_prefix(salt, expire_at);

        let outcome = tokio::task::spawn_blocking(move || {
            run_search(&engine, &module, &challenge, &prefix, difficulty)
        })
        .await
        .map_err(|e| DeeptermError::Solver(format!("PoW search task failed: {}", e)))?
        .map_err(|e| DeeptermError::Solver(format!("{:#}", e)))?;

        if !outcome.found {
            return Err(DeeptermError::PowNotFound);
        }
        if !outcome.answer.is_finite() || outcome.answer < 0.0 {
            return Err(DeeptermError::Solver(format!(
                "Search returned an invalid answer: {}",
                outcome.answer
            )));
        }

        let answer = outcome.answer.floor() as u64;
        debug!("PoW solved: difficulty={}, answer={}", difficulty, answer);
        Ok(answer)
    }
}

fn run_search(
    engine: &Engine,
    module: &Module,
    challenge: &str,
    prefix: &str,
    difficulty: f64,
) -> wasmtime::Result<SearchOutcome> {
    let mut store = Store::new(engine, ());
    let instance = Instance::new(&mut store, module, &[])?;

    let memory = instance
        .get_memory(&mut store, "memory")
        .ok_or_else(|| wasmtime::Error::msg("WASM memory unavailable"))?;
    let malloc = ALLOCATOR_EXPORTS
        .iter()
        .find_map(|name| {
            instance
                .get_typed_func::<(i32, i32), i32>(&mut store, name)
                .ok()
        })
        .ok_or_else(|| wasmtime::Error::msg("WASM allocator (malloc) not found on exports"))?;
    let add_to_stack_pointer = STACK_POINTER_EXPORTS
        .iter()
        .find_map(|name| instance.get_typed_func::<i32, i32>(&mut store, name).ok());
    let solve = instance
        .get_typed_func::<(i32, i32, i32, i32, i32, f64), ()>(&mut store, SOLVE_EXPORT)
        .map_err(|_| wasmtime::Error::msg("wasm_solve not found in wasm exports"))?;

    let (challenge_ptr, challenge_len) = write_utf8(&mut store, &memory, &malloc, challenge)?;
    let (prefix_ptr, prefix_len) = write_utf8(&mut store, &memory, &malloc, prefix)?;

    let ret_ptr = match &add_to_stack_pointer {
        Some(add) => add.call(&mut store, -RETURN_SLOT_SIZE)?,
        None => malloc.call(&mut store, (RETURN_SLOT_SIZE, 1))?,
    };

    solve.call(
        &mut store,
        (
            ret_ptr,
            challenge_ptr,
            challenge_len,
            prefix_ptr,
            prefix_len,
            difficulty,
        ),
    )?;

    let mut slot = [0u8; RETURN_SLOT_SIZE as usize];
    memory.read(&store, wasm_offset(ret_ptr), &mut slot)?;
    if let Some(add) = &add_to_stack_pointer {
        add.call(&mut store, RETURN_SLOT_SIZE)?;
    }

    let mut found = [0u8; 4];
    found.copy_from_slice(&slot[0..4]);
    let mut answer = [0u8; 8];
    answer.copy_from_slice(&slot[8..16]);

    Ok(SearchOutcome {
        found: i32::from_le_bytes(found) != 0,
        answer: f64::from_le_bytes(answer),
    })
}

fn write_utf8(
    store: &mut Store<()>,
    memory: &Memory,
    malloc: &TypedFunc<(i32, i32), i32>,
    text: &str,
) -> wasmtime::Result<(i32, i32)> {
    let bytes = text.as_bytes();
    let len = i32::try_from(bytes.len())?;
    let ptr = malloc.call(&mut *store, (len, 1))?;
    memory.write(&mut *store, wasm_offset(ptr), bytes)?;
    Ok((ptr, len))
}

// Pointers cross the boundary as i32 but address memory as u32.
fn wasm_offset(ptr: i32) -> usize {
    ptr as u32 as usize
}
