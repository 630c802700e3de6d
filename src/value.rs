use memchr::memmem;
use regex::Regex;

/// A query operand after scope-specific coercion, ready to compare.
#[derive(Debug, Clone)]
pub enum CastValue {
    Str(String),
    Regex(Regex),
    Num(u64),
    Bool(bool),
    /// Epoch milliseconds of a local midnight.
    EpochMs(i64),
}

/// What a scope extracts from a file.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Str(String),
    Num(u64),
    Bool(bool),
    EpochMs(i64),
    List(Vec<String>),
}

impl QueryValue {
    /// Case-insensitive mode folds string results the same way the query
    /// string itself was folded before tokenizing.
    pub fn lowercase(&mut self) {
        match self {
            QueryValue::Str(value) => *value = value.to_lowercase(),
            QueryValue::List(values) if !values.is_empty() => {
                for value in values.iter_mut() {
                    *value = value.to_lowercase();
                }
            }
            _ => {}
        }
    }
}

/// Keyword/phrase comparison. Dispatches on the cast and query tags; list
/// results succeed on any element, except `!=` which requires every element
/// to differ.
pub(crate) fn match_primitive(operator: &str, cast: &CastValue, query: &QueryValue) -> bool {
    match (cast, query) {
        (CastValue::Str(needle), QueryValue::Str(value)) => compare_str(operator, needle, value),
        (CastValue::Str(needle), QueryValue::List(values)) => {
            if operator == "!=" {
                values.iter().all(|value| value != needle)
            } else {
                values.iter().any(|value| compare_str(operator, needle, value))
            }
        }
        (CastValue::Num(rhs), QueryValue::Num(lhs)) => compare_ord(operator, lhs, rhs),
        (CastValue::EpochMs(rhs), QueryValue::EpochMs(lhs)) => compare_ord(operator, lhs, rhs),
        (CastValue::Bool(rhs), QueryValue::Bool(lhs)) => match operator {
            ":" | "=" => lhs == rhs,
            "!=" => lhs != rhs,
            _ => false,
        },
        _ => false,
    }
}

/// Regexp comparison; list results succeed on any matching element.
pub(crate) fn match_regexp(_operator: &str, cast: &CastValue, query: &QueryValue) -> bool {
    let CastValue::Regex(pattern) = cast else {
        return false;
    };
    match query {
        QueryValue::Str(value) => pattern.is_match(value),
        QueryValue::List(values) => values.iter().any(|value| pattern.is_match(value)),
        _ => false,
    }
}

fn compare_str(operator: &str, needle: &str, value: &str) -> bool {
    match operator {
        ":" => memmem::find(value.as_bytes(), needle.as_bytes()).is_some(),
        "=" => value == needle,
        "!=" => value != needle,
        _ => false,
    }
}

fn compare_ord<T: PartialOrd>(operator: &str, lhs: &T, rhs: &T) -> bool {
    match operator {
        ":" | "=" => lhs == rhs,
        "!=" => lhs != rhs,
        ">" => lhs > rhs,
        ">=" => lhs >= rhs,
        "<" => lhs < rhs,
        "<=" => lhs <= rhs,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(values: &[&str]) -> QueryValue {
        QueryValue::List(values.iter().map(|v| v.to_string()).collect())
    }

    #[test]
    fn string_inclusion_and_equality() {
        let needle = CastValue::Str("orl".into());
        assert!(match_primitive(":", &needle, &QueryValue::Str("world".into())));
        assert!(!match_primitive("=", &needle, &QueryValue::Str("world".into())));
        let exact = CastValue::Str("world".into());
        assert!(match_primitive("=", &exact, &QueryValue::Str("world".into())));
        assert!(match_primitive("!=", &exact, &QueryValue::Str("word".into())));
    }

    #[test]
    fn numeric_comparisons() {
        let ten = CastValue::Num(10);
        assert!(match_primitive(">", &ten, &QueryValue::Num(11)));
        assert!(!match_primitive(">", &ten, &QueryValue::Num(10)));
        assert!(match_primitive("<=", &ten, &QueryValue::Num(10)));
        assert!(match_primitive("!=", &ten, &QueryValue::Num(9)));
    }

    #[test]
    fn list_matches_any_element_except_not_equal() {
        let needle = CastValue::Str("python".into());
        assert!(match_primitive(":", &needle, &list(&["rust", "python"])));
        assert!(match_primitive("=", &needle, &list(&["rust", "python"])));
        assert!(!match_primitive("!=", &needle, &list(&["rust", "python"])));
        assert!(match_primitive("!=", &needle, &list(&["rust", "go"])));
    }

    #[test]
    fn regexp_matches_strings_and_lists() {
        let pattern = CastValue::Regex(Regex::new("^wo.ld$").unwrap());
        assert!(match_regexp(":", &pattern, &QueryValue::Str("world".into())));
        assert!(match_regexp(":", &pattern, &list(&["sea", "world"])));
        assert!(!match_regexp(":", &pattern, &list(&["sea"])));
    }

    #[test]
    fn mismatched_tags_never_match() {
        let needle = CastValue::Str("10".into());
        assert!(!match_primitive(":", &needle, &QueryValue::Num(10)));
        assert!(!match_regexp(":", &needle, &QueryValue::Str("10".into())));
    }

    #[test]
    fn lowercase_folds_strings_and_lists() {
        let mut value = QueryValue::Str("WoRld".into());
        value.lowercase();
        assert_eq!(value, QueryValue::Str("world".into()));
        let mut value = list(&["A", "b"]);
        value.lowercase();
        assert_eq!(value, list(&["a", "b"]));
        let mut value = QueryValue::Num(3);
        value.lowercase();
        assert_eq!(value, QueryValue::Num(3));
    }
}
