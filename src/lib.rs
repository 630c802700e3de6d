//! # mdseek
//!
//! Finds Markdown files in a directory tree with a compact search grammar
//! reminiscent of code-hosting search boxes: boolean operators, grouping,
//! scoped qualifiers, and keyword / phrase / regexp literals.
//!
//! ```no_run
//! use mdseek::Finder;
//!
//! let finder = Finder::new();
//! for record in finder.find("size>10kb | blockcodelang:python", "./notes", false).unwrap() {
//!     println!("{}", record.unwrap().path);
//! }
//! ```
//!
//! A query compiles in four steps — tokenize, validate, parse, then a
//! single leaf walk that validates and casts every operand against its
//! scope. Evaluation streams: each file the walker yields is tested against
//! the tree with short-circuit boolean logic, and matches surface as soon
//! as they are confirmed.

mod evaluator;
mod grammar;
mod markdown;
mod registry;
mod value;

pub use evaluator::Matches;
pub use markdown::select::{MdFilter, MdTransform, TaskMode};
pub use markdown::{Container, MdToken, MdTokenKind};
pub use registry::{
    cast_string_or_regex, validate_string_or_regex, CastFn, MatchFn, QualifierSpec, QueryFn,
    Registry, ValidateFn, OPERATORS,
};
pub use value::{CastValue, QueryValue};

pub use mdseek_syntax::{Expr, Leaf, LeafKind, ParseError, Token, TokenKind};
pub use mdwalk::{FileRecord, FileStats, WalkOptions, Walker};

use anyhow::{anyhow, bail, Result};
use mdseek_syntax::Tokenizer;
use std::path::Path;

/// Owns a scope registry and the tokenizer derived from it. Both are
/// immutable between calls to [`Finder::register`], so one finder can serve
/// any number of queries.
pub struct Finder {
    registry: Registry,
    tokenizer: Tokenizer,
}

impl Default for Finder {
    fn default() -> Self {
        Self::new()
    }
}

impl Finder {
    /// A finder with the built-in scopes.
    pub fn new() -> Self {
        Self::from_registry(Registry::with_defaults())
    }

    /// A finder with the built-in scopes plus `extra` entries. Entries
    /// reusing a built-in scope name replace it.
    pub fn with_qualifiers(extra: impl IntoIterator<Item = QualifierSpec>) -> Self {
        let mut registry = Registry::with_defaults();
        registry.register(extra);
        Self::from_registry(registry)
    }

    fn from_registry(registry: Registry) -> Self {
        let tokenizer = Tokenizer::new(registry.scopes(), registry.operators().iter().copied());
        Self {
            registry,
            tokenizer,
        }
    }

    /// Adds or replaces registry entries and rebuilds the tokenizer so new
    /// scope literals are recognized.
    pub fn register(&mut self, entries: impl IntoIterator<Item = QualifierSpec>) {
        self.registry.register(entries);
        self.tokenizer = Tokenizer::new(
            self.registry.scopes(),
            self.registry.operators().iter().copied(),
        );
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The grammar as BNF, scope and operator lists interpolated from the
    /// current registry.
    pub fn grammar(&self) -> String {
        grammar::render(&self.registry)
    }

    /// Compiles a query: tokenize, validate, parse, then validate and cast
    /// every leaf. With `case_sensitive` off the whole input is lowercased
    /// first, phrase and regexp literals included.
    pub fn parse(&self, query: &str, case_sensitive: bool) -> Result<Expr<CastValue>> {
        let lowered;
        let query = if case_sensitive {
            query
        } else {
            lowered = query.to_lowercase();
            &lowered
        };
        let tokens = self.tokenizer.tokenize(query.trim());
        mdseek_syntax::validate(&tokens)?;
        let mut expr: Expr<CastValue> = mdseek_syntax::parse(&tokens)?;
        expr.traverse_mut(&mut |leaf| {
            let qualifier = self
                .registry
                .get(&leaf.scope)
                .ok_or_else(|| anyhow!("Unknown scope:「{}」", leaf.scope))?;
            if let Err(message) =
                qualifier.validate(&leaf.scope, &leaf.operator, &leaf.operand, leaf.kind)
            {
                bail!("In {}: {}", leaf.scope.to_uppercase(), message);
            }
            leaf.cast = Some(qualifier.cast(&leaf.operand, leaf.kind)?);
            Ok(())
        })?;
        Ok(expr)
    }

    /// Compiles `query` and streams the files under `dir` that satisfy it.
    /// All compile errors surface here, before any file is touched.
    pub fn find(
        &self,
        query: &str,
        dir: impl AsRef<Path>,
        case_sensitive: bool,
    ) -> Result<Matches<'_>> {
        if query.is_empty() {
            bail!("query is must");
        }
        let expr = self.parse(query, case_sensitive)?;
        self.find_by_ast(expr, dir, case_sensitive)
    }

    /// Streams files matching an already compiled tree, using the default
    /// walk filters.
    pub fn find_by_ast(
        &self,
        expr: Expr<CastValue>,
        dir: impl AsRef<Path>,
        case_sensitive: bool,
    ) -> Result<Matches<'_>> {
        self.find_by_ast_with(expr, dir, case_sensitive, WalkOptions::default())
    }

    /// Streams files matching an already compiled tree with caller-supplied
    /// walk filter chains.
    pub fn find_by_ast_with(
        &self,
        expr: Expr<CastValue>,
        dir: impl AsRef<Path>,
        case_sensitive: bool,
        options: WalkOptions,
    ) -> Result<Matches<'_>> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            bail!("dir is must");
        }
        Ok(Matches::new(self, expr, dir, case_sensitive, options))
    }

    /// The evaluator's leaf callback: extract the scope's value, fold case
    /// if requested, and dispatch on the literal kind.
    pub(crate) fn match_leaf(
        &self,
        leaf: &Leaf<CastValue>,
        record: &FileRecord,
        case_sensitive: bool,
    ) -> Result<bool> {
        let qualifier = self
            .registry
            .get(&leaf.scope)
            .ok_or_else(|| anyhow!("Unknown scope:「{}」", leaf.scope))?;
        let mut value = qualifier.query(record)?;
        if !case_sensitive {
            value.lowercase();
        }
        let cast = leaf
            .cast
            .as_ref()
            .ok_or_else(|| anyhow!("Leaf「{}」was never cast", leaf.operand))?;
        Ok(qualifier.matches(leaf.kind, &leaf.operator, cast, &value))
    }
}
