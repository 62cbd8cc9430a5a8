use std::fmt;

use tracing::debug;

use crate::error::RuntimeError;
use crate::frame::Namespace;
use crate::interpreter::Interpreter;
use crate::programs;
use crate::value::Value;

pub type Routine = fn(&mut Interpreter) -> Result<Value, RuntimeError>;

/// A named routine a launcher can start a module from.
#[derive(Clone, Copy)]
pub struct EntryPoint {
    pub name: &'static str,
    pub routine: Routine,
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryPoint").field("name", &self.name).finish()
    }
}

/// A loadable unit of the runtime: one source file and the routines it defines.
#[derive(Debug, Clone, Copy)]
pub struct Module {
    pub name: &'static str,
    /// Source path reported in frames, relative to the device root.
    pub source: &'static str,
    /// Module-level bindings created when the module is loaded.
    pub globals: fn() -> Namespace,
    pub entry_points: &'static [EntryPoint],
}

impl Module {
    pub fn entry_point(&self, name: &str) -> Option<EntryPoint> {
        self.entry_points.iter().find(|entry| entry.name == name).copied()
    }
}

/// Modules known to the runtime, looked up by module path.
#[derive(Debug, Clone, Default)]
pub struct ProgramRegistry {
    modules: Vec<Module>,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the modules bundled with the runtime.
    pub fn with_builtin_modules() -> Self {
        let mut registry = Self::new();
        registry.register(programs::target::module());
        registry
    }

    pub fn register(&mut self, module: Module) {
        self.modules.retain(|m| m.name != module.name);
        self.modules.push(module);
    }

    /// Resolves a module path (`target`, `target.py`, `src/target.py`) and an
    /// entry-point name.
    pub fn resolve(&self, module_path: &str, entry_point: &str) -> Result<(Module, EntryPoint), RuntimeError> {
        let name = module_name(module_path);
        debug!(module_path, name, entry_point, "Resolving entry point");

        let module = self
            .modules
            .iter()
            .find(|m| m.name == name)
            .copied()
            .ok_or_else(|| RuntimeError::ModuleNotFound(module_path.to_string()))?;

        let entry = module
            .entry_point(entry_point)
            .ok_or_else(|| RuntimeError::EntryPointNotFound {
                module: module.name.to_string(),
                entry_point: entry_point.to_string(),
            })?;

        Ok((module, entry))
    }
}

fn module_name(module_path: &str) -> &str {
    let file = module_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(module_path);
    file.strip_suffix(".py")
        .or_else(|| file.strip_suffix(".mpy"))
        .unwrap_or(file)
}
