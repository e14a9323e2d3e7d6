//! Named SQL templates and the text-level helpers used to dispatch them.

pub mod placeholders;
pub mod registry;
pub mod statements;

pub use placeholders::{CompiledSql, compile_placeholders};
pub use registry::{SqlTemplate, SqlTemplateRegistry, TEMPLATE_EXTENSION, TemplateError};
pub use statements::split_statements;
