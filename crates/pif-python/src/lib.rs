//! Python-facing helpers for `pif`: interpreter discovery, module search
//! path handling, package name validation, and the import probe.

mod import;
mod interpreter;
mod package;
mod search_path;

pub use import::{check_import, ImportCheck};
pub use interpreter::{detect_interpreter, RUNTIME_PYTHON_ENV};
pub use package::{InvalidPackageName, PackageName};
pub use search_path::{PythonPath, PYTHONPATH_ENV};
