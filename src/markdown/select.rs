//! Filter predicates and transformers the Markdown scopes are assembled
//! from. A scope's query is `walk tokens ▷ filter ▷ transform ▷ drop empty`.
//!
//! Filters are stateful across one walk (they track container nesting), so
//! each query invocation builds a fresh filter.

use super::{Container, MdToken, MdTokenKind};
use once_cell::sync::Lazy;
use regex::Regex;

pub type MdFilter = Box<dyn FnMut(&MdToken) -> bool>;
pub type MdTransform = Box<dyn Fn(&MdToken) -> Vec<String> + Send + Sync>;

static TASK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\[(x|X| )\]\s+(.+)").expect("task pattern"));

/// Keeps tokens of exactly one kind.
pub fn is(kind: MdTokenKind) -> MdFilter {
    Box::new(move |token| token.kind == kind)
}

/// Keeps tokens nested (at any depth) inside `target`.
pub fn wrapped_by(target: Container) -> MdFilter {
    let mut depth = 0i32;
    Box::new(move |token| {
        match token.kind {
            MdTokenKind::Open(container) if container == target => depth += 1,
            MdTokenKind::Close(container) if container == target => depth -= 1,
            _ => {}
        }
        depth > 0
    })
}

/// Like [`wrapped_by`], but only counts containers carrying `tag` — used to
/// tell `h2` apart from the other heading levels.
pub fn wrapped_by_tag(target: Container, tag: &'static str) -> MdFilter {
    let mut depth = 0i32;
    Box::new(move |token| {
        match token.kind {
            MdTokenKind::Open(container) if container == target && token.tag == tag => depth += 1,
            MdTokenKind::Close(container) if container == target && token.tag == tag => depth -= 1,
            _ => {}
        }
        depth > 0
    })
}

/// Keeps tokens properly nested in the exact given container order. Opening
/// container `i` resets every deeper counter, so `ol > li > p` content never
/// leaks into a `ul > li > p` selection.
pub fn wrapped_by_multi(targets: Vec<Container>) -> MdFilter {
    let mut slots = vec![0i32; targets.len()];
    Box::new(move |token| {
        match token.kind {
            MdTokenKind::Open(container) => {
                if let Some(i) = targets.iter().position(|&t| t == container) {
                    slots[i] += 1;
                    for slot in &mut slots[i + 1..] {
                        *slot = 0;
                    }
                }
            }
            MdTokenKind::Close(container) => {
                if let Some(i) = targets.iter().position(|&t| t == container) {
                    slots[i] = (slots[i] - 1).max(0);
                }
            }
            _ => {}
        }
        slots.iter().all(|&slot| slot > 0)
    })
}

pub fn content() -> MdTransform {
    Box::new(|token| vec![token.content.clone()])
}

pub fn info() -> MdTransform {
    Box::new(|token| vec![token.info.clone()])
}

pub fn info_and_content() -> MdTransform {
    Box::new(|token| vec![format!("{} {}", token.info, token.content)])
}

/// Attribute values and content, space-joined: a link contributes its href
/// and text, an image its src and alt.
pub fn attr_and_content() -> MdTransform {
    Box::new(|token| {
        let mut parts: Vec<&str> = token.attrs.iter().map(|(_, value)| value.as_str()).collect();
        parts.push(&token.content);
        vec![parts.join(" ")]
    })
}

pub fn content_line() -> MdTransform {
    Box::new(|token| token.content.split('\n').map(str::to_string).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMode {
    Any,
    Done,
    Todo,
}

/// Extracts the text of `[x]` / `[ ]` items whose checkbox state matches
/// `mode`.
pub fn task_content(mode: TaskMode) -> MdTransform {
    Box::new(move |token| {
        let Some(captures) = TASK.captures(&token.content) else {
            return Vec::new();
        };
        let done = !matches!(&captures[1], " ");
        let keep = match mode {
            TaskMode::Any => true,
            TaskMode::Done => done,
            TaskMode::Todo => !done,
        };
        if keep {
            vec![captures[2].to_string()]
        } else {
            Vec::new()
        }
    })
}

/// The space-joined first capture of every `pattern` match in the content.
pub fn regexp_content(pattern: Regex) -> MdTransform {
    Box::new(move |token| {
        let joined = pattern
            .captures_iter(&token.content)
            .filter_map(|captures| captures.get(1))
            .map(|capture| capture.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        if joined.is_empty() {
            Vec::new()
        } else {
            vec![joined]
        }
    })
}

/// Runs one stateful walk: every token feeds the filter, survivors are
/// transformed, empty strings are dropped.
pub fn select(tokens: &[MdToken], mut filter: MdFilter, transform: &MdTransform) -> Vec<String> {
    let mut out = Vec::new();
    for token in tokens {
        if filter(token) {
            for value in transform(token) {
                if !value.is_empty() {
                    out.push(value);
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::parse;

    #[test]
    fn wrapped_by_tracks_nesting() {
        let tokens = parse("> outer\n\nplain");
        let values = select(&tokens, wrapped_by(Container::Blockquote), &content());
        assert_eq!(values, vec!["outer", "outer"]);
    }

    #[test]
    fn wrapped_by_tag_separates_heading_levels() {
        let tokens = parse("# Intro\n\n## Setup");
        let h1 = select(
            &tokens,
            wrapped_by_tag(Container::Heading, "h1"),
            &content(),
        );
        assert_eq!(h1, vec!["Intro", "Intro"]);
        let h2 = select(
            &tokens,
            wrapped_by_tag(Container::Heading, "h2"),
            &content(),
        );
        assert_eq!(h2, vec!["Setup", "Setup"]);
    }

    #[test]
    fn multi_wrap_isolates_bullet_tasks_from_ordered_items() {
        let tokens = parse("1. [x] numbered\n\n- [x] bulleted");
        let filter = wrapped_by_multi(vec![
            Container::BulletList,
            Container::ListItem,
            Container::Paragraph,
        ]);
        let values = select(&tokens, filter, &task_content(TaskMode::Any));
        assert_eq!(values, vec!["bulleted", "bulleted"]);
    }

    #[test]
    fn task_modes_split_done_and_todo() {
        let token = MdToken {
            kind: MdTokenKind::Inline,
            tag: "",
            content: "[x] ship it".to_string(),
            info: String::new(),
            attrs: Vec::new(),
        };
        assert_eq!(task_content(TaskMode::Any)(&token), vec!["ship it"]);
        assert_eq!(task_content(TaskMode::Done)(&token), vec!["ship it"]);
        assert!(task_content(TaskMode::Todo)(&token).is_empty());
        let todo = MdToken {
            content: "[ ] later".to_string(),
            ..token.clone()
        };
        assert_eq!(task_content(TaskMode::Todo)(&todo), vec!["later"]);
        assert!(task_content(TaskMode::Done)(&todo).is_empty());
        let plain = MdToken {
            content: "no checkbox".to_string(),
            ..token
        };
        assert!(task_content(TaskMode::Any)(&plain).is_empty());
    }

    #[test]
    fn regexp_content_joins_first_captures() {
        let token = MdToken {
            kind: MdTokenKind::Inline,
            tag: "",
            content: "==one== and ==two==".to_string(),
            info: String::new(),
            attrs: Vec::new(),
        };
        let transform = regexp_content(Regex::new("==([^=]+?)==").unwrap());
        assert_eq!(transform(&token), vec!["one two"]);
        let empty = MdToken {
            content: "nothing".to_string(),
            ..token
        };
        assert!(transform(&empty).is_empty());
    }

    #[test]
    fn select_drops_empty_values() {
        let tokens = parse("# Head");
        let values = select(&tokens, wrapped_by(Container::Heading), &content());
        // The open/close tokens have empty content and disappear.
        assert_eq!(values, vec!["Head", "Head"]);
    }
}
