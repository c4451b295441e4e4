//! Module loader embedded at the top of every bundle
//!
//! `__tinypack_define(id, factory)` registers a factory without running it.
//! `require(id)` returns cached exports, or creates the module record, caches
//! it, and only then runs the factory with `(module, exports, require)`.
//! Both tables live inside the bundle's outer function, so two bundles loaded
//! into one host never share modules.

/// Loader source, emitted verbatim
pub const RUNTIME: &str = include_str!("runtime.js");

/// Name of the registration function the runtime defines
pub const DEFINE_FN: &str = "__tinypack_define";

/// Opens the function scope that encloses the whole bundle
pub const PRELUDE: &str = "(function () {\n";

/// Closes the bundle scope
pub const EPILOGUE: &str = "})();\n";

/// Factory parameters, in the order the runtime passes them
pub const FACTORY_PARAMS: &str = "module, exports, require";

/// Entry-point invocation appended after all registrations
pub fn entry_invocation(entry: impl std::fmt::Display) -> String {
    format!("require({entry});\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_defines_loader() {
        assert!(RUNTIME.contains(&format!("function {DEFINE_FN}(id, factory)")));
        assert!(RUNTIME.contains("function require(id)"));
        assert!(RUNTIME.ends_with('\n'));
    }

    #[test]
    fn test_module_cached_before_factory_runs() {
        let cached = RUNTIME
            .find("__tinypack_cache[id] = module;")
            .expect("cache insertion");
        let invoked = RUNTIME
            .find("factory.call(module.exports, module, module.exports, require);")
            .expect("factory invocation");
        assert!(cached < invoked);
    }

    #[test]
    fn test_unknown_module_guard() {
        assert!(RUNTIME.contains("throw new Error(\"tinypack: unknown module \" + id);"));
    }

    #[test]
    fn test_entry_invocation() {
        assert_eq!(entry_invocation(0), "require(0);\n");
    }
}
