//! Scope registry: every qualifier the query language understands, as a
//! quadruple of validate / cast / query / match functions.

mod base;
mod markdown;

use crate::value::{match_primitive, match_regexp, CastValue, QueryValue};
use anyhow::Result;
use hashbrown::HashMap;
use mdseek_syntax::LeafKind;
use mdwalk::FileRecord;
use regex::Regex;
use std::sync::Arc;

/// Operators the grammar recognizes, longest first so the tokenizer's
/// maximal munch sees `>=` before `>`.
pub const OPERATORS: &[&str] = &["!=", ">=", "<=", ":", "=", ">", "<"];

/// Checks an operand against a scope's operator and literal-kind rules.
/// Returns the bare message; the caller prefixes `In SCOPE:`.
pub type ValidateFn = Arc<dyn Fn(&str, &str, &str, LeafKind) -> Result<(), String> + Send + Sync>;
/// Coerces a validated operand into a comparable value.
pub type CastFn = Arc<dyn Fn(&str, LeafKind) -> Result<CastValue> + Send + Sync>;
/// Extracts a scope's value from one file record.
pub type QueryFn = Arc<dyn Fn(&FileRecord) -> Result<QueryValue> + Send + Sync>;
/// Compares `(scope, operator, cast value, query value)`.
pub type MatchFn = Arc<dyn Fn(&str, &str, &CastValue, &QueryValue) -> bool + Send + Sync>;

/// A fully resolved registry entry.
pub struct Qualifier {
    pub scope: String,
    pub name: String,
    /// True when the scope reflects file metadata rather than content.
    pub is_meta: bool,
    validate: ValidateFn,
    cast: CastFn,
    query: QueryFn,
    match_keyword: MatchFn,
    match_phrase: MatchFn,
    match_regexp: MatchFn,
}

impl Qualifier {
    pub fn validate(
        &self,
        scope: &str,
        operator: &str,
        operand: &str,
        kind: LeafKind,
    ) -> Result<(), String> {
        (self.validate)(scope, operator, operand, kind)
    }

    pub fn cast(&self, operand: &str, kind: LeafKind) -> Result<CastValue> {
        (self.cast)(operand, kind)
    }

    pub fn query(&self, record: &FileRecord) -> Result<QueryValue> {
        (self.query)(record)
    }

    pub fn matches(
        &self,
        kind: LeafKind,
        operator: &str,
        cast: &CastValue,
        query: &QueryValue,
    ) -> bool {
        let matcher = match kind {
            LeafKind::Keyword => &self.match_keyword,
            LeafKind::Phrase => &self.match_phrase,
            LeafKind::Regexp => &self.match_regexp,
        };
        matcher(&self.scope, operator, cast, query)
    }
}

/// A registry entry as supplied by a caller. Only `scope`, `name`, and
/// `query` are mandatory; omitted fields fall back to the string-or-regex
/// validators and the primitive/regex matchers.
pub struct QualifierSpec {
    pub scope: String,
    pub name: String,
    pub is_meta: bool,
    pub validate: Option<ValidateFn>,
    pub cast: Option<CastFn>,
    pub query: QueryFn,
    pub match_keyword: Option<MatchFn>,
    pub match_phrase: Option<MatchFn>,
    pub match_regexp: Option<MatchFn>,
}

impl QualifierSpec {
    pub fn new(
        scope: impl Into<String>,
        name: impl Into<String>,
        query: impl Fn(&FileRecord) -> Result<QueryValue> + Send + Sync + 'static,
    ) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
            is_meta: false,
            validate: None,
            cast: None,
            query: Arc::new(query),
            match_keyword: None,
            match_phrase: None,
            match_regexp: None,
        }
    }

    pub fn meta(mut self) -> Self {
        self.is_meta = true;
        self
    }

    pub fn validate(
        mut self,
        f: impl Fn(&str, &str, &str, LeafKind) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Arc::new(f));
        self
    }

    pub fn cast(
        mut self,
        f: impl Fn(&str, LeafKind) -> Result<CastValue> + Send + Sync + 'static,
    ) -> Self {
        self.cast = Some(Arc::new(f));
        self
    }

    pub fn match_keyword(
        mut self,
        f: impl Fn(&str, &str, &CastValue, &QueryValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.match_keyword = Some(Arc::new(f));
        self
    }

    pub fn match_phrase(
        mut self,
        f: impl Fn(&str, &str, &CastValue, &QueryValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.match_phrase = Some(Arc::new(f));
        self
    }

    pub fn match_regexp(
        mut self,
        f: impl Fn(&str, &str, &CastValue, &QueryValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.match_regexp = Some(Arc::new(f));
        self
    }

    /// Fills the gaps with the default fallbacks: string-or-regex
    /// validate/cast, primitive compare for keywords, keyword matcher for
    /// phrases, regex matcher for regexps.
    fn complete(self) -> Qualifier {
        let match_keyword = self.match_keyword.unwrap_or_else(|| {
            Arc::new(|_: &str, op: &str, cast: &CastValue, query: &QueryValue| {
                match_primitive(op, cast, query)
            })
        });
        let match_phrase = self.match_phrase.unwrap_or_else(|| match_keyword.clone());
        let match_regexp = self.match_regexp.unwrap_or_else(|| {
            Arc::new(|_: &str, op: &str, cast: &CastValue, query: &QueryValue| {
                match_regexp(op, cast, query)
            })
        });
        Qualifier {
            scope: self.scope,
            name: self.name,
            is_meta: self.is_meta,
            validate: self
                .validate
                .unwrap_or_else(|| Arc::new(validate_string_or_regex)),
            cast: self.cast.unwrap_or_else(|| Arc::new(cast_string_or_regex)),
            query: self.query,
            match_keyword,
            match_phrase,
            match_regexp,
        }
    }
}

/// Maps each scope to its qualifier, preserving registration order for the
/// grammar and the tokenizer catalogue.
pub struct Registry {
    order: Vec<String>,
    entries: HashMap<String, Qualifier>,
}

impl Registry {
    /// An empty registry; callers almost always want
    /// [`Registry::with_defaults`].
    pub fn empty() -> Self {
        Self {
            order: Vec::new(),
            entries: HashMap::new(),
        }
    }

    /// The 14 base scopes followed by the 28 Markdown scopes.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        base::install(&mut registry);
        markdown::install(&mut registry);
        registry
    }

    pub fn register(&mut self, specs: impl IntoIterator<Item = QualifierSpec>) {
        for spec in specs {
            let qualifier = spec.complete();
            if !self.entries.contains_key(&qualifier.scope) {
                self.order.push(qualifier.scope.clone());
            }
            self.entries.insert(qualifier.scope.clone(), qualifier);
        }
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn operators(&self) -> &'static [&'static str] {
        OPERATORS
    }

    pub fn get(&self, scope: &str) -> Option<&Qualifier> {
        self.entries.get(scope)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Default validator: `:`/`=`/`!=` for plain literals, `:` with a
/// compilable pattern for regexps.
pub fn validate_string_or_regex(
    _scope: &str,
    operator: &str,
    operand: &str,
    kind: LeafKind,
) -> Result<(), String> {
    if kind == LeafKind::Regexp {
        if operator != ":" {
            return Err("Regular expression operand only supports「:」".to_string());
        }
        return match Regex::new(operand) {
            Ok(_) => Ok(()),
            Err(error) => Err(format!("Invalid regular expression: {error}")),
        };
    }
    if matches!(operator, ":" | "=" | "!=") {
        Ok(())
    } else {
        Err(format!("Unsupported operator:「{operator}」"))
    }
}

/// Default cast: compile regexps, keep keywords and phrases as-is.
pub fn cast_string_or_regex(operand: &str, kind: LeafKind) -> Result<CastValue> {
    match kind {
        LeafKind::Regexp => Ok(CastValue::Regex(Regex::new(operand)?)),
        LeafKind::Keyword | LeafKind::Phrase => Ok(CastValue::Str(operand.to_string())),
    }
}
