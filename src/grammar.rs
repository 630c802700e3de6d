//! Renders the query grammar as BNF, with the scope and operator catalogues
//! interpolated from the live registry.

use crate::registry::Registry;

pub fn render(registry: &Registry) -> String {
    let scopes = registry
        .scopes()
        .map(|scope| format!("\"{scope}\""))
        .collect::<Vec<_>>()
        .join(" | ");
    let operators = registry
        .operators()
        .iter()
        .map(|operator| format!("\"{operator}\""))
        .collect::<Vec<_>>()
        .join(" | ");
    format!(
        "\
query      ::= expression
expression ::= term ( OR term )*
term       ::= factor ( ( AND | NOT ) factor )*
factor     ::= qualifier? match
match      ::= KEYWORD | PHRASE | REGEXP | PAREN_OPEN expression PAREN_CLOSE
qualifier  ::= scope operator
OR         ::= '|' | 'OR'
AND        ::= WHITESPACE | 'AND'
NOT        ::= '-'
PAREN_OPEN ::= '('
PAREN_CLOSE ::= ')'
PHRASE     ::= '\"' [^\"]* '\"'
REGEXP     ::= '/' pattern '/'
KEYWORD    ::= [^ \"()|]+
scope      ::= {scopes}
operator   ::= {operators}
"
    )
}
