use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("Module not found: {0}")]
    ModuleNotFound(String),
    #[error("Entry point \"{entry_point}\" not found in module \"{module}\"")]
    EntryPointNotFound { module: String, entry_point: String },
    #[error("Name \"{0}\" is not defined")]
    NameNotDefined(String),
    #[error("Expected {expected} for \"{name}\", got {actual}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Integer overflow in {0}")]
    Overflow(&'static str),
    #[error("Execution aborted by debugger")]
    Aborted,
}
