//! Tool definitions and registry.

pub mod registry;
pub mod text;

pub use registry::{ParamSpec, ParamType, ToolHandler, ToolRegistry, ToolSpec};
pub use text::{DecodeTool, ObfuscateTool, rot13};

use crate::error::ToolResult;

/// Create the registry with the built-in tools registered.
pub fn create_registry() -> ToolResult<ToolRegistry> {
    let registry = ToolRegistry::new();
    registry.register(ObfuscateTool)?;
    registry.register(DecodeTool)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tools_registered_in_order() {
        let registry = create_registry().unwrap();
        let names: Vec<String> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["obfuscate", "decode"]);
    }
}
