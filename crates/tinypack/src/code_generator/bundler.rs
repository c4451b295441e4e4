use std::{borrow::Cow, path::PathBuf};

use log::debug;
use serde::Serialize;

use crate::{
    code_generator::{
        rewriter::rewrite_requires,
        runtime::{DEFINE_FN, EPILOGUE, FACTORY_PARAMS, PRELUDE, RUNTIME, entry_invocation},
    },
    error::{BundleError, Result},
    module_registry::{FxIndexMap, Module, ModuleId, ModuleTable},
};

/// Where one module's registration block sits in the bundle text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSpan {
    pub id: ModuleId,
    pub path: PathBuf,
    /// 1-based line of the `__tinypack_define(` call
    pub start_line: usize,
    /// 1-based line of the closing `});`
    pub end_line: usize,
}

/// Serialized bundle plus the position of every module in it
#[derive(Debug, Clone)]
pub struct Bundle {
    pub code: String,
    /// Spans in emission order (highest id first)
    pub modules: Vec<ModuleSpan>,
}

impl Bundle {
    pub fn span(&self, id: ModuleId) -> Option<&ModuleSpan> {
        self.modules.iter().find(|span| span.id == id)
    }
}

/// Text sink that keeps count of the lines written so far
#[derive(Debug, Default)]
struct BundleWriter {
    code: String,
    newlines: usize,
}

impl BundleWriter {
    fn push(&mut self, text: &str) {
        self.newlines += text.matches('\n').count();
        self.code.push_str(text);
    }

    fn current_line(&self) -> usize {
        self.newlines + 1
    }
}

/// Serialize a fully transformed module table into a single script.
///
/// Layout, inside one enclosing function scope: the loader runtime, one
/// registration per module in reverse id order (entry last), then
/// `require(0)`. Output depends only on the table contents.
pub fn serialize(table: &ModuleTable) -> Result<Bundle> {
    if table.is_empty() {
        return Err(BundleError::Serialization {
            module: PathBuf::new(),
            specifier: String::new(),
            message: "module table is empty".to_owned(),
        });
    }

    let mut writer = BundleWriter::default();
    writer.push(PRELUDE);
    writer.push(RUNTIME);

    let mut spans = Vec::with_capacity(table.len());
    for module in table.iter().rev() {
        let body = module_body(table, module)?;

        let start_line = writer.current_line();
        writer.push(&format!(
            "{DEFINE_FN}({}, function ({FACTORY_PARAMS}) {{\n",
            module.id
        ));
        writer.push(&body);
        if !body.is_empty() && !body.ends_with('\n') {
            writer.push("\n");
        }
        writer.push("});\n");

        spans.push(ModuleSpan {
            id: module.id,
            path: module.path.clone(),
            start_line,
            end_line: writer.newlines,
        });
    }

    writer.push(&entry_invocation(ModuleId::ENTRY));
    writer.push(EPILOGUE);

    debug!(
        "Serialized {} modules into {} bytes",
        spans.len(),
        writer.code.len()
    );
    Ok(Bundle {
        code: writer.code,
        modules: spans,
    })
}

/// Transformed source of `module` with its requires pointing at ids
fn module_body(table: &ModuleTable, module: &Module) -> Result<String> {
    let Some(source) = module.transformed_source.as_deref() else {
        return Err(BundleError::Serialization {
            module: module.path.clone(),
            specifier: String::new(),
            message: "module has no transformed source".to_owned(),
        });
    };

    let mut targets: FxIndexMap<String, ModuleId> = FxIndexMap::default();
    for (specifier, id) in table.dependency_ids(module) {
        let Some(id) = id else {
            return Err(BundleError::Serialization {
                module: module.path.clone(),
                specifier: specifier.to_owned(),
                message: "dependency is not in the module table".to_owned(),
            });
        };
        targets.insert(specifier.to_owned(), id);
    }

    rewrite_requires(&module.path, &neutralize_shebang(source), &targets)
}

/// A `#!` line is only legal at the very start of a script; inside a factory
/// it becomes a line comment of the same length. A leading byte order mark is
/// dropped.
fn neutralize_shebang(source: &str) -> Cow<'_, str> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    match source.strip_prefix("#!") {
        Some(rest) => Cow::Owned(format!("//{rest}")),
        None => Cow::Borrowed(source),
    }
}
