//! Import discovery visitor that finds every module specifier in a JavaScript
//! source: CommonJS `require("x")` calls, static `import`/`export ... from`
//! declarations and dynamic `import("x")` expressions.
//!
//! Discovery runs over the token stream from [`crate::js_lexer`], so quote
//! style and formatting do not matter and specifier-looking text inside
//! comments, strings, templates or regular expressions is never reported.

use std::ops::Range;

use indexmap::IndexSet;
use log::trace;

use crate::js_lexer::{Token, TokenKind, tokenize};

/// How a specifier was referenced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImportKind {
    /// `require("x")`
    Require,
    /// `import x from "x"` or `import "x"`
    Import,
    /// `export { a } from "x"` or `export * from "x"`
    ExportFrom,
    /// `import("x")`
    DynamicImport,
}

/// A specifier discovered in a module's source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredImport {
    /// Decoded specifier value, e.g. `./util`
    pub specifier: String,
    pub kind: ImportKind,
    /// Byte range of the string literal token, quotes included
    pub range: Range<usize>,
}

/// Visitor that walks the token stream of one module
#[derive(Debug)]
pub struct ImportDiscoveryVisitor<'a> {
    tokens: Vec<Token<'a>>,
    imports: Vec<DiscoveredImport>,
}

impl<'a> ImportDiscoveryVisitor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            tokens: tokenize(source),
            imports: Vec::new(),
        }
    }

    /// Discover all imports in source order
    pub fn into_imports(mut self) -> Vec<DiscoveredImport> {
        for index in 0..self.tokens.len() {
            if self.is_member_access(index) {
                continue;
            }
            let (kind, text) = (self.tokens[index].kind, self.tokens[index].text);
            if kind != TokenKind::Ident {
                continue;
            }
            match text {
                "require" => self.visit_require(index),
                "import" => self.visit_import(index),
                "export" => self.visit_export(index),
                _ => {}
            }
        }
        self.imports
    }

    /// `foo.require(...)` or `foo?.import` are property accesses, not module references
    fn is_member_access(&self, index: usize) -> bool {
        index
            .checked_sub(1)
            .and_then(|prev| self.tokens.get(prev))
            .is_some_and(|prev| prev.is_punct(".") || prev.is_punct("?."))
    }

    fn token(&self, index: usize) -> Option<&Token<'a>> {
        self.tokens.get(index)
    }

    /// Index of the string argument of a `name(` call starting at `index`,
    /// if the call has exactly one string literal as its first argument
    fn call_string_argument(&self, index: usize) -> Option<usize> {
        let open = self.token(index + 1)?;
        let argument = self.token(index + 2)?;
        let close = self.token(index + 3)?;
        if !open.is_punct("(") {
            return None;
        }
        if argument.kind != TokenKind::Str {
            if argument.kind == TokenKind::Template {
                trace!(
                    "Skipping computed specifier at byte {}",
                    argument.range.start
                );
            }
            return None;
        }
        (close.is_punct(")") || close.is_punct(",")).then_some(index + 2)
    }

    fn record(&mut self, string_index: usize, kind: ImportKind) {
        let token = &self.tokens[string_index];
        let Some(specifier) = token.string_value() else {
            return;
        };
        trace!("Discovered {kind:?} of '{specifier}'");
        self.imports.push(DiscoveredImport {
            specifier,
            kind,
            range: token.range.clone(),
        });
    }

    fn visit_require(&mut self, index: usize) {
        if let Some(argument) = self.call_string_argument(index) {
            self.record(argument, ImportKind::Require);
        }
    }

    fn visit_import(&mut self, index: usize) {
        let Some(next) = self.token(index + 1) else {
            return;
        };

        if next.kind == TokenKind::Str {
            // import "./side-effect"
            self.record(index + 1, ImportKind::Import);
        } else if next.is_punct("(") {
            if let Some(argument) = self.call_string_argument(index) {
                self.record(argument, ImportKind::DynamicImport);
            }
        } else if let Some(source) = self.find_from_clause(index + 1) {
            self.record(source, ImportKind::Import);
        }
    }

    fn visit_export(&mut self, index: usize) {
        let Some(next) = self.token(index + 1) else {
            return;
        };
        if (next.is_punct("*") || next.is_punct("{"))
            && let Some(source) = self.find_from_clause(index + 1)
        {
            self.record(source, ImportKind::ExportFrom);
        }
    }

    /// Walk an import/export clause (`a, { b as c }`, `* as ns`, ...) starting
    /// at `index` and return the index of the string after `from`.
    /// Gives up on any token that cannot appear in such a clause.
    fn find_from_clause(&self, mut index: usize) -> Option<usize> {
        loop {
            let token = self.token(index)?;
            match token.kind {
                TokenKind::Ident => {
                    if token.text == "from"
                        && let Some(source) = self.token(index + 1)
                        && source.kind == TokenKind::Str
                    {
                        return Some(index + 1);
                    }
                    index += 1;
                }
                TokenKind::Punct if token.text == "," || token.text == "*" => index += 1,
                TokenKind::Punct if token.text == "{" => index = self.skip_braces(index)?,
                // `export { "string name" as x } from`
                TokenKind::Str => index += 1,
                _ => return None,
            }
        }
    }

    /// Index just past the `}` matching the `{` at `index`
    fn skip_braces(&self, index: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (offset, token) in self.tokens[index..].iter().enumerate() {
            if token.is_punct("{") {
                depth += 1;
            } else if token.is_punct("}") {
                depth -= 1;
                if depth == 0 {
                    return Some(index + offset + 1);
                }
            } else if token.is_punct(";") {
                return None;
            }
        }
        None
    }
}

/// All imports of a module in source order
pub fn discover_imports(source: &str) -> Vec<DiscoveredImport> {
    ImportDiscoveryVisitor::new(source).into_imports()
}

/// Distinct specifiers in first-occurrence order
pub fn unique_specifiers(imports: &[DiscoveredImport]) -> IndexSet<String> {
    imports.iter().map(|i| i.specifier.clone()).collect()
}
