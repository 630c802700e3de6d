//! The 28 Markdown scopes. Each one is a (filter, transformer) pair over
//! the flattened Markdown token walk; all of them produce string lists and
//! inherit the default list-aware matchers.

use super::{QualifierSpec, QueryFn, Registry};
use crate::markdown::select::{
    attr_and_content, content, content_line, info, info_and_content, is, regexp_content, select,
    task_content, wrapped_by, wrapped_by_multi, wrapped_by_tag, MdFilter, MdTransform, TaskMode,
};
use crate::markdown::{parse_cached, Container, MdTokenKind};
use crate::value::QueryValue;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static HIGHLIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new("==([^=]+?)==").expect("highlight pattern"));

/// Builds the query function for one Markdown scope. The filter is rebuilt
/// per invocation because it carries nesting counters.
fn md_query(
    filter: impl Fn() -> MdFilter + Send + Sync + 'static,
    transform: MdTransform,
) -> QueryFn {
    Arc::new(move |record: &mdwalk::FileRecord| {
        let text = String::from_utf8_lossy(&record.data);
        let tokens = parse_cached(&text);
        Ok(QueryValue::List(select(&tokens, filter(), &transform)))
    })
}

fn entry(
    scope: &str,
    name: &str,
    filter: impl Fn() -> MdFilter + Send + Sync + 'static,
    transform: MdTransform,
) -> QualifierSpec {
    QualifierSpec {
        scope: scope.to_string(),
        name: name.to_string(),
        is_meta: false,
        validate: None,
        cast: None,
        query: md_query(filter, transform),
        match_keyword: None,
        match_phrase: None,
        match_regexp: None,
    }
}

fn task_filter() -> MdFilter {
    wrapped_by_multi(vec![
        Container::BulletList,
        Container::ListItem,
        Container::Paragraph,
    ])
}

pub(super) fn install(registry: &mut Registry) {
    registry.register([
        entry(
            "blockcode",
            "Code block",
            || is(MdTokenKind::Fence),
            info_and_content(),
        ),
        entry(
            "blockcodelang",
            "Code block language",
            || is(MdTokenKind::Fence),
            info(),
        ),
        entry(
            "blockcodebody",
            "Code block body",
            || is(MdTokenKind::Fence),
            content(),
        ),
        entry(
            "blockcodeline",
            "Code block line",
            || is(MdTokenKind::Fence),
            content_line(),
        ),
        entry(
            "blockhtml",
            "HTML block",
            || is(MdTokenKind::HtmlBlock),
            content(),
        ),
        entry(
            "blockquote",
            "Blockquote",
            || wrapped_by(Container::Blockquote),
            content(),
        ),
        entry("table", "Table", || wrapped_by(Container::Table), content()),
        entry(
            "thead",
            "Table head",
            || wrapped_by(Container::Thead),
            content(),
        ),
        entry(
            "tbody",
            "Table body",
            || wrapped_by(Container::Tbody),
            content(),
        ),
        entry(
            "ol",
            "Ordered list",
            || wrapped_by(Container::OrderedList),
            content(),
        ),
        entry(
            "ul",
            "Bullet list",
            || wrapped_by(Container::BulletList),
            content(),
        ),
        entry("task", "Task", task_filter, task_content(TaskMode::Any)),
        entry(
            "taskdone",
            "Completed task",
            task_filter,
            task_content(TaskMode::Done),
        ),
        entry(
            "tasktodo",
            "Open task",
            task_filter,
            task_content(TaskMode::Todo),
        ),
        entry(
            "head",
            "Heading",
            || wrapped_by(Container::Heading),
            content(),
        ),
        entry(
            "highlight",
            "Highlight",
            || is(MdTokenKind::Inline),
            regexp_content(HIGHLIGHT.clone()),
        ),
        entry(
            "image",
            "Image",
            || is(MdTokenKind::Image),
            attr_and_content(),
        ),
        entry(
            "code",
            "Inline code",
            || is(MdTokenKind::CodeInline),
            content(),
        ),
        entry("link", "Link", || is(MdTokenKind::Link), attr_and_content()),
        entry(
            "strong",
            "Strong",
            || wrapped_by(Container::Strong),
            content(),
        ),
        entry("em", "Emphasis", || wrapped_by(Container::Em), content()),
        entry(
            "del",
            "Strikethrough",
            || wrapped_by(Container::Del),
            content(),
        ),
    ]);
    registry.register(
        ["h1", "h2", "h3", "h4", "h5", "h6"].map(|tag| {
            entry(
                tag,
                "Heading level",
                move || wrapped_by_tag(Container::Heading, tag),
                content(),
            )
        }),
    );
}
