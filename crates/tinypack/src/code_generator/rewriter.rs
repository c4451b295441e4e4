//! Specifier-exact `require` rewriting
//!
//! The transformed source is tokenized again and only the string argument of
//! a `require(...)` call is replaced. Identical text in comments, other
//! strings, templates or regex literals is never touched.

use std::{ops::Range, path::Path};

use log::trace;
use rustc_hash::FxHashSet;

use crate::{
    error::{BundleError, Result},
    module_registry::{FxIndexMap, ModuleId},
    visitors::{DiscoveredImport, ImportKind, discover_imports},
};

/// Replace the specifier of every `require` call in `source` with the id its
/// specifier maps to in `targets`.
///
/// Fails when a specifier in `targets` has no `require` call site left (the
/// transformer dropped it, or it only appears in ES module syntax) and when a
/// `require` call names a specifier outside `targets`.
pub fn rewrite_requires(
    module: &Path,
    source: &str,
    targets: &FxIndexMap<String, ModuleId>,
) -> Result<String> {
    let imports = discover_imports(source);

    let mut edits: Vec<(Range<usize>, ModuleId)> = Vec::new();
    let mut rewritten: FxHashSet<&str> = FxHashSet::default();
    for import in &imports {
        if import.kind != ImportKind::Require {
            continue;
        }
        let Some(&id) = targets.get(&import.specifier) else {
            return Err(BundleError::Serialization {
                module: module.to_path_buf(),
                specifier: import.specifier.clone(),
                message: "require call is not part of the module graph; the transformer \
                          introduced a dependency that was never resolved"
                    .to_owned(),
            });
        };
        edits.push((import.range.clone(), id));
        rewritten.insert(&import.specifier);
    }

    for specifier in targets.keys() {
        if !rewritten.contains(specifier.as_str()) {
            return Err(BundleError::Serialization {
                module: module.to_path_buf(),
                specifier: specifier.clone(),
                message: missing_call_site_message(&imports, specifier),
            });
        }
    }

    Ok(apply_edits(source, &mut edits))
}

fn missing_call_site_message(imports: &[DiscoveredImport], specifier: &str) -> String {
    let esm_only = imports
        .iter()
        .any(|import| import.specifier == specifier && import.kind != ImportKind::Require);
    if esm_only {
        "only found in import/export syntax; configure a transform command that lowers ES \
         modules to require()"
            .to_owned()
    } else {
        "no require call site in the transformed source".to_owned()
    }
}

/// Splice ids over the string tokens, front to back
fn apply_edits(source: &str, edits: &mut [(Range<usize>, ModuleId)]) -> String {
    edits.sort_unstable_by_key(|(range, _)| range.start);

    let mut output = String::with_capacity(source.len());
    let mut cursor = 0;
    for (range, id) in edits.iter() {
        trace!("Rewriting {} -> {id}", &source[range.clone()]);
        output.push_str(&source[cursor..range.start]);
        output.push_str(&id.to_string());
        cursor = range.end;
    }
    output.push_str(&source[cursor..]);
    output
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn targets(pairs: &[(&str, u32)]) -> FxIndexMap<String, ModuleId> {
        pairs
            .iter()
            .map(|(specifier, id)| ((*specifier).to_owned(), ModuleId::new(*id)))
            .collect()
    }

    fn rewrite(source: &str, pairs: &[(&str, u32)]) -> Result<String> {
        rewrite_requires(Path::new("/app/a.js"), source, &targets(pairs))
    }

    #[test]
    fn test_rewrites_each_quote_style() -> Result<()> {
        let source = "const b = require(\"./b\");\nconst c = require('./c');\nrequire(`./d`);\n";
        assert_eq!(
            rewrite(source, &[("./b", 1), ("./c", 2), ("./d", 3)])?,
            "const b = require(1);\nconst c = require(2);\nrequire(3);\n"
        );
        Ok(())
    }

    #[test]
    fn test_repeated_calls_all_rewritten() -> Result<()> {
        let source = "require('./b'); if (x) { require( \"./b\" ).go(); }";
        assert_eq!(
            rewrite(source, &[("./b", 4)])?,
            "require(4); if (x) { require( 4 ).go(); }"
        );
        Ok(())
    }

    #[test]
    fn test_unrelated_text_is_not_corrupted() -> Result<()> {
        let source = concat!(
            "// require('./b') in a comment\n",
            "const label = \"./b\";\n",
            "const msg = `loading ${\"./b\"}`;\n",
            "const re = /\\.\\/b/;\n",
            "const obj = { require: \"./b\" };\n",
            "const b = require(\"./b\");\n",
            "const bb = require(\"./bb\");\n",
        );
        let expected = concat!(
            "// require('./b') in a comment\n",
            "const label = \"./b\";\n",
            "const msg = `loading ${\"./b\"}`;\n",
            "const re = /\\.\\/b/;\n",
            "const obj = { require: \"./b\" };\n",
            "const b = require(1);\n",
            "const bb = require(2);\n",
        );
        assert_eq!(rewrite(source, &[("./b", 1), ("./bb", 2)])?, expected);
        Ok(())
    }

    #[test]
    fn test_member_require_is_left_alone() -> Result<()> {
        let source = "loader.require('./b'); require('./b');";
        assert_eq!(
            rewrite(source, &[("./b", 1)])?,
            "loader.require('./b'); require(1);"
        );
        Ok(())
    }

    #[test]
    fn test_missing_call_site_is_an_error() {
        let err = rewrite("module.exports = 1;", &[("./b", 1)]).expect_err("no call site");
        match err {
            BundleError::Serialization {
                module, specifier, ..
            } => {
                assert_eq!(module, Path::new("/app/a.js"));
                assert_eq!(specifier, "./b");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_esm_only_dependency_suggests_lowering() {
        let err = rewrite("import b from './b';", &[("./b", 1)]).expect_err("esm import");
        assert!(err.to_string().contains("lowers ES modules"), "{err}");
    }

    #[test]
    fn test_unknown_require_is_an_error() {
        let err = rewrite("require('./b'); require('./helpers');", &[("./b", 1)])
            .expect_err("introduced dependency");
        assert!(
            matches!(&err, BundleError::Serialization { specifier, .. } if specifier == "./helpers"),
            "{err}"
        );
    }

    #[test]
    fn test_no_dependencies_keeps_source() -> Result<()> {
        let source = "module.exports = \"ok\";\n";
        assert_eq!(rewrite(source, &[])?, source);
        Ok(())
    }
}
