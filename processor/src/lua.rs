//! Lua script execution.

use crate::config::ConfigError;
use mlua::prelude::*;
use shared::{DynamicValue, ScriptError, ScriptExecutor};
use std::path::Path;

/// Runs entrypoints of a Lua 5.4 script.
///
/// The source is read once. Every call gets a fresh interpreter, so globals
/// a script sets during one batch are gone by the next.
#[derive(Debug, Clone)]
pub struct LuaExecutor {
    name: String,
    source: String,
}

impl LuaExecutor {
    /// Creates an executor from source text; `name` shows up in Lua errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use processor::LuaExecutor;
    /// use shared::{DynamicValue, ScriptExecutor};
    ///
    /// let executor = LuaExecutor::new("double.lua", "function process(x) return x * 2 end");
    /// let result = executor.execute("process", vec![DynamicValue::Int(21)]).unwrap();
    /// assert_eq!(result, DynamicValue::Int(42));
    /// ```
    #[must_use]
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Reads the script at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadScript`] if the file cannot be read.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadScript {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(path.display().to_string(), source))
    }

    /// Loads the script once without calling anything.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Runtime`] on syntax errors or errors raised by
    /// top-level code.
    pub fn check(&self) -> Result<(), ScriptError> {
        self.load().map(drop)
    }

    /// Returns `true` if the script defines a global function `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ScriptError::Runtime`] if the script does not load.
    pub fn has_function(&self, name: &str) -> Result<bool, ScriptError> {
        let lua = self.load()?;
        let value: LuaValue = lua.globals().get(name).map_err(runtime)?;
        Ok(matches!(value, LuaValue::Function(_)))
    }

    fn load(&self) -> Result<Lua, ScriptError> {
        let lua = Lua::new();
        lua.load(self.source.as_str())
            .set_name(self.name.as_str())
            .exec()
            .map_err(runtime)?;
        Ok(lua)
    }
}

impl ScriptExecutor for LuaExecutor {
    fn execute(
        &self,
        entrypoint: &str,
        params: Vec<DynamicValue>,
    ) -> Result<DynamicValue, ScriptError> {
        let lua = self.load()?;
        let function = match lua.globals().get::<LuaValue>(entrypoint).map_err(runtime)? {
            LuaValue::Function(function) => function,
            _ => return Err(ScriptError::EntrypointNotFound(entrypoint.to_string())),
        };

        let args: LuaVariadic<DynamicValue> = params.into_iter().collect();
        function.call::<DynamicValue>(args).map_err(runtime)
    }
}

fn runtime(error: LuaError) -> ScriptError {
    ScriptError::Runtime(Box::new(error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::DynamicMap;

    #[test]
    fn test_missing_entrypoint() {
        let executor = LuaExecutor::new("empty.lua", "local x = 1");
        let result = executor.execute("process", Vec::new());
        assert!(matches!(result, Err(ScriptError::EntrypointNotFound(name)) if name == "process"));
    }

    #[test]
    fn test_non_function_global_is_not_an_entrypoint() {
        let executor = LuaExecutor::new("value.lua", "process = 5");
        assert!(matches!(
            executor.execute("process", Vec::new()),
            Err(ScriptError::EntrypointNotFound(_))
        ));
        assert!(!executor.has_function("process").unwrap());
    }

    #[test]
    fn test_syntax_error_is_runtime_error() {
        let executor = LuaExecutor::new("broken.lua", "function process(");
        assert!(matches!(executor.check(), Err(ScriptError::Runtime(_))));
    }

    #[test]
    fn test_lua_error_is_reported() {
        let executor = LuaExecutor::new("fail.lua", "function process(t) error('rejected') end");
        let Err(ScriptError::Runtime(error)) = executor.execute("process", vec![DynamicValue::Absent])
        else {
            panic!("expected a runtime error");
        };
        assert!(error.to_string().contains("rejected"));
    }

    #[test]
    fn test_no_state_between_calls() {
        let executor = LuaExecutor::new(
            "counter.lua",
            "calls = 0\nfunction process() calls = calls + 1; return calls end",
        );
        assert_eq!(executor.execute("process", Vec::new()).unwrap(), DynamicValue::Int(1));
        assert_eq!(executor.execute("process", Vec::new()).unwrap(), DynamicValue::Int(1));
    }

    #[test]
    fn test_table_param_roundtrip() {
        let executor = LuaExecutor::new(
            "tag.lua",
            "function process(t) t.tagged = true; return t end",
        );
        let mut node = DynamicMap::new();
        node.insert("name".to_string(), DynamicValue::from("cpu"));

        let DynamicValue::Map(result) = executor
            .execute("process", vec![DynamicValue::Map(node)])
            .unwrap()
        else {
            panic!("expected a table");
        };
        assert_eq!(result.get("tagged"), Some(&DynamicValue::Bool(true)));
        assert_eq!(result.get("name"), Some(&DynamicValue::from("cpu")));
    }

    #[test]
    fn test_missing_file() {
        let result = LuaExecutor::from_file(Path::new("/nonexistent/otlua/script.lua"));
        assert!(matches!(result, Err(ConfigError::ReadScript { .. })));
    }
}
