//! Flattens a pulldown-cmark event stream into the token sequence the
//! Markdown scopes walk: `Open`/`Close` pairs for containers, consolidated
//! leaf tokens for fences, HTML blocks, inline runs, code spans, links and
//! images.
//!
//! Two shapes are synthesized so filters see one canonical structure:
//! tight list items get the paragraph wrapper loose items already have, and
//! the rows after a table head get a `Tbody` container.

pub mod select;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use pulldown_cmark::utils::TextMergeStream;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use std::sync::Arc;

/// Containers tracked with `Open`/`Close` tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Blockquote,
    Heading,
    BulletList,
    OrderedList,
    ListItem,
    Paragraph,
    Table,
    Thead,
    Tbody,
    Strong,
    Em,
    Del,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MdTokenKind {
    Open(Container),
    Close(Container),
    /// Fenced or indented code block; `info` holds the fence info string.
    Fence,
    HtmlBlock,
    /// The consolidated plain text of one paragraph, heading, or table cell.
    Inline,
    /// One text run inside an inline container.
    Text,
    CodeInline,
    /// `attrs` holds `href`, `content` the link text.
    Link,
    /// `attrs` holds `src`, `content` the alt text.
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MdToken {
    pub kind: MdTokenKind,
    /// `h1`..`h6` on heading tokens, empty otherwise.
    pub tag: &'static str,
    pub content: String,
    pub info: String,
    pub attrs: Vec<(String, String)>,
}

impl MdToken {
    fn open(container: Container, tag: &'static str) -> Self {
        Self::bare(MdTokenKind::Open(container), tag)
    }

    fn close(container: Container, tag: &'static str) -> Self {
        Self::bare(MdTokenKind::Close(container), tag)
    }

    fn bare(kind: MdTokenKind, tag: &'static str) -> Self {
        Self {
            kind,
            tag,
            content: String::new(),
            info: String::new(),
            attrs: Vec::new(),
        }
    }

    fn leaf(kind: MdTokenKind, content: String) -> Self {
        Self {
            kind,
            tag: "",
            content,
            info: String::new(),
            attrs: Vec::new(),
        }
    }
}

/// Single-slot parse memo keyed by the input text, so successive qualifier
/// queries against the same file share one parse. Overwritten as soon as a
/// different text is seen.
static PARSE_CACHE: Lazy<Mutex<Option<(String, Arc<Vec<MdToken>>)>>> =
    Lazy::new(|| Mutex::new(None));

pub fn parse_cached(text: &str) -> Arc<Vec<MdToken>> {
    let mut slot = PARSE_CACHE.lock();
    if let Some((key, tokens)) = slot.as_ref() {
        if key == text {
            return Arc::clone(tokens);
        }
    }
    let tokens = Arc::new(parse(text));
    *slot = Some((text.to_string(), Arc::clone(&tokens)));
    tokens
}

pub fn parse(text: &str) -> Vec<MdToken> {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let mut builder = Builder::default();
    for event in TextMergeStream::new(Parser::new_ext(text, options)) {
        builder.event(event);
    }
    builder.tokens
}

#[derive(Default)]
struct Builder {
    tokens: Vec<MdToken>,
    inline: Option<InlineBlock>,
    code: Option<CodeBlock>,
    html: Option<String>,
    link: Option<SpanBuf>,
    image: Option<SpanBuf>,
    in_table_head: bool,
    table_body_open: bool,
}

struct InlineBlock {
    text: String,
    children: Vec<MdToken>,
    /// True when this paragraph was synthesized around bare inline content
    /// (tight list items) and must be closed by the builder itself.
    synthetic: bool,
}

struct SpanBuf {
    url: String,
    text: String,
}

struct CodeBlock {
    info: String,
    text: String,
}

impl Builder {
    fn event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.code_span(&code),
            Event::Html(html) => match &mut self.html {
                Some(buffer) => buffer.push_str(&html),
                None => self.tokens.push(MdToken::leaf(
                    MdTokenKind::HtmlBlock,
                    html.into_string(),
                )),
            },
            Event::InlineHtml(html) => self.text(&html),
            Event::SoftBreak | Event::HardBreak => self.line_break(),
            Event::Rule => self.close_synthetic(),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => {
                self.close_synthetic();
                self.tokens.push(MdToken::open(Container::Paragraph, ""));
                self.inline = Some(InlineBlock::explicit());
            }
            Tag::Heading { level, .. } => {
                self.close_synthetic();
                self.tokens
                    .push(MdToken::open(Container::Heading, heading_tag(level)));
                self.inline = Some(InlineBlock::explicit());
            }
            Tag::BlockQuote(_) => {
                self.close_synthetic();
                self.tokens.push(MdToken::open(Container::Blockquote, ""));
            }
            Tag::CodeBlock(kind) => {
                self.close_synthetic();
                let info = match kind {
                    CodeBlockKind::Fenced(info) => info.trim().to_string(),
                    CodeBlockKind::Indented => String::new(),
                };
                self.code = Some(CodeBlock {
                    info,
                    text: String::new(),
                });
            }
            Tag::List(Some(_)) => {
                self.close_synthetic();
                self.tokens.push(MdToken::open(Container::OrderedList, ""));
            }
            Tag::List(None) => {
                self.close_synthetic();
                self.tokens.push(MdToken::open(Container::BulletList, ""));
            }
            Tag::Item => {
                self.close_synthetic();
                self.tokens.push(MdToken::open(Container::ListItem, ""));
            }
            Tag::Table(_) => {
                self.close_synthetic();
                self.tokens.push(MdToken::open(Container::Table, ""));
                self.in_table_head = false;
                self.table_body_open = false;
            }
            Tag::TableHead => {
                self.tokens.push(MdToken::open(Container::Thead, ""));
                self.in_table_head = true;
            }
            Tag::TableRow => {
                if !self.in_table_head && !self.table_body_open {
                    self.tokens.push(MdToken::open(Container::Tbody, ""));
                    self.table_body_open = true;
                }
            }
            Tag::TableCell => self.inline = Some(InlineBlock::explicit()),
            Tag::Strong => self.child_open(Container::Strong),
            Tag::Emphasis => self.child_open(Container::Em),
            Tag::Strikethrough => self.child_open(Container::Del),
            Tag::Link { dest_url, .. } => {
                self.ensure_inline();
                self.link = Some(SpanBuf {
                    url: dest_url.into_string(),
                    text: String::new(),
                });
            }
            Tag::Image { dest_url, .. } => {
                self.ensure_inline();
                self.image = Some(SpanBuf {
                    url: dest_url.into_string(),
                    text: String::new(),
                });
            }
            Tag::HtmlBlock => {
                self.close_synthetic();
                self.html = Some(String::new());
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                self.finish_inline();
                self.tokens.push(MdToken::close(Container::Paragraph, ""));
            }
            TagEnd::Heading(level) => {
                self.finish_inline();
                self.tokens
                    .push(MdToken::close(Container::Heading, heading_tag(level)));
            }
            TagEnd::BlockQuote(_) => {
                self.close_synthetic();
                self.tokens.push(MdToken::close(Container::Blockquote, ""));
            }
            TagEnd::CodeBlock => {
                if let Some(code) = self.code.take() {
                    let mut token = MdToken::leaf(MdTokenKind::Fence, code.text);
                    token.info = code.info;
                    self.tokens.push(token);
                }
            }
            TagEnd::List(true) => {
                self.close_synthetic();
                self.tokens.push(MdToken::close(Container::OrderedList, ""));
            }
            TagEnd::List(false) => {
                self.close_synthetic();
                self.tokens.push(MdToken::close(Container::BulletList, ""));
            }
            TagEnd::Item => {
                self.close_synthetic();
                self.tokens.push(MdToken::close(Container::ListItem, ""));
            }
            TagEnd::Table => {
                if self.table_body_open {
                    self.tokens.push(MdToken::close(Container::Tbody, ""));
                    self.table_body_open = false;
                }
                self.tokens.push(MdToken::close(Container::Table, ""));
            }
            TagEnd::TableHead => {
                self.tokens.push(MdToken::close(Container::Thead, ""));
                self.in_table_head = false;
            }
            TagEnd::TableRow => {}
            TagEnd::TableCell => self.finish_inline(),
            TagEnd::Strong => self.child_close(Container::Strong),
            TagEnd::Emphasis => self.child_close(Container::Em),
            TagEnd::Strikethrough => self.child_close(Container::Del),
            TagEnd::Link => {
                if let Some(span) = self.link.take() {
                    let mut token = MdToken::leaf(MdTokenKind::Link, span.text);
                    token.attrs = vec![("href".to_string(), span.url)];
                    self.child_token(token);
                }
            }
            TagEnd::Image => {
                if let Some(span) = self.image.take() {
                    let mut token = MdToken::leaf(MdTokenKind::Image, span.text);
                    token.attrs = vec![("src".to_string(), span.url)];
                    self.child_token(token);
                }
            }
            TagEnd::HtmlBlock => {
                if let Some(html) = self.html.take() {
                    self.tokens
                        .push(MdToken::leaf(MdTokenKind::HtmlBlock, html));
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some(code) = &mut self.code {
            code.text.push_str(text);
            return;
        }
        if let Some(buffer) = &mut self.html {
            buffer.push_str(text);
            return;
        }
        if let Some(image) = &mut self.image {
            image.text.push_str(text);
            return;
        }
        self.ensure_inline();
        if let Some(block) = &mut self.inline {
            block.text.push_str(text);
        }
        match &mut self.link {
            Some(link) => link.text.push_str(text),
            None => {
                if let Some(block) = &mut self.inline {
                    block
                        .children
                        .push(MdToken::leaf(MdTokenKind::Text, text.to_string()));
                }
            }
        }
    }

    fn code_span(&mut self, code: &str) {
        if let Some(image) = &mut self.image {
            image.text.push_str(code);
            return;
        }
        self.ensure_inline();
        if let Some(block) = &mut self.inline {
            block.text.push_str(code);
        }
        match &mut self.link {
            Some(link) => link.text.push_str(code),
            None => {
                if let Some(block) = &mut self.inline {
                    block
                        .children
                        .push(MdToken::leaf(MdTokenKind::CodeInline, code.to_string()));
                }
            }
        }
    }

    /// Breaks extend the running text buffers but never become tokens of
    /// their own.
    fn line_break(&mut self) {
        if let Some(image) = &mut self.image {
            image.text.push('\n');
            return;
        }
        if let Some(link) = &mut self.link {
            link.text.push('\n');
        }
        if let Some(block) = &mut self.inline {
            block.text.push('\n');
        }
    }

    fn child_open(&mut self, container: Container) {
        if self.link.is_some() || self.image.is_some() {
            return;
        }
        self.ensure_inline();
        if let Some(block) = &mut self.inline {
            block.children.push(MdToken::open(container, ""));
        }
    }

    fn child_close(&mut self, container: Container) {
        if self.link.is_some() || self.image.is_some() {
            return;
        }
        if let Some(block) = &mut self.inline {
            block.children.push(MdToken::close(container, ""));
        }
    }

    fn child_token(&mut self, token: MdToken) {
        self.ensure_inline();
        if let Some(block) = &mut self.inline {
            block.children.push(token);
        }
    }

    fn ensure_inline(&mut self) {
        if self.inline.is_none() {
            self.tokens.push(MdToken::open(Container::Paragraph, ""));
            self.inline = Some(InlineBlock::synthetic());
        }
    }

    fn close_synthetic(&mut self) {
        if self.inline.as_ref().is_some_and(|block| block.synthetic) {
            self.finish_inline();
            self.tokens.push(MdToken::close(Container::Paragraph, ""));
        }
    }

    fn finish_inline(&mut self) {
        if let Some(block) = self.inline.take() {
            self.tokens
                .push(MdToken::leaf(MdTokenKind::Inline, block.text));
            self.tokens.extend(block.children);
        }
    }
}

impl InlineBlock {
    fn explicit() -> Self {
        Self {
            text: String::new(),
            children: Vec::new(),
            synthetic: false,
        }
    }

    fn synthetic() -> Self {
        Self {
            text: String::new(),
            children: Vec::new(),
            synthetic: true,
        }
    }
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(tokens: &[MdToken]) -> Vec<MdTokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    fn find(tokens: &[MdToken], kind: MdTokenKind) -> Vec<&MdToken> {
        tokens.iter().filter(|t| t.kind == kind).collect()
    }

    #[test]
    fn paragraph_produces_inline_and_text() {
        let tokens = parse("hello world");
        assert_eq!(
            kinds(&tokens),
            vec![
                MdTokenKind::Open(Container::Paragraph),
                MdTokenKind::Inline,
                MdTokenKind::Text,
                MdTokenKind::Close(Container::Paragraph),
            ]
        );
        assert_eq!(tokens[1].content, "hello world");
    }

    #[test]
    fn heading_tokens_carry_their_tag() {
        let tokens = parse("# Intro\n\n## Setup");
        let opens = find(&tokens, MdTokenKind::Open(Container::Heading));
        assert_eq!(opens.len(), 2);
        assert_eq!(opens[0].tag, "h1");
        assert_eq!(opens[1].tag, "h2");
        let inlines = find(&tokens, MdTokenKind::Inline);
        assert_eq!(inlines[0].content, "Intro");
        assert_eq!(inlines[1].content, "Setup");
    }

    #[test]
    fn fence_keeps_info_and_body() {
        let tokens = parse("```python\nprint(1)\n```");
        let fences = find(&tokens, MdTokenKind::Fence);
        assert_eq!(fences.len(), 1);
        assert_eq!(fences[0].info, "python");
        assert_eq!(fences[0].content, "print(1)\n");
    }

    #[test]
    fn indented_code_has_empty_info() {
        let tokens = parse("    let x = 1;\n");
        let fences = find(&tokens, MdTokenKind::Fence);
        assert_eq!(fences.len(), 1);
        assert_eq!(fences[0].info, "");
        assert!(fences[0].content.contains("let x = 1;"));
    }

    #[test]
    fn tight_list_items_get_a_synthetic_paragraph() {
        let tokens = parse("- [x] done\n- [ ] todo");
        let expected_prefix = vec![
            MdTokenKind::Open(Container::BulletList),
            MdTokenKind::Open(Container::ListItem),
            MdTokenKind::Open(Container::Paragraph),
            MdTokenKind::Inline,
        ];
        assert_eq!(kinds(&tokens)[..4], expected_prefix[..]);
        let inlines = find(&tokens, MdTokenKind::Inline);
        assert_eq!(inlines[0].content, "[x] done");
        assert_eq!(inlines[1].content, "[ ] todo");
    }

    #[test]
    fn table_rows_after_the_head_get_a_tbody() {
        let tokens = parse("| a | b |\n| - | - |\n| c | d |");
        let sequence = kinds(&tokens);
        let thead_open = sequence
            .iter()
            .position(|k| *k == MdTokenKind::Open(Container::Thead))
            .unwrap();
        let tbody_open = sequence
            .iter()
            .position(|k| *k == MdTokenKind::Open(Container::Tbody))
            .unwrap();
        assert!(thead_open < tbody_open);
        let inlines: Vec<String> = find(&tokens, MdTokenKind::Inline)
            .iter()
            .map(|t| t.content.clone())
            .collect();
        assert_eq!(inlines, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn emphasis_children_wrap_their_text() {
        let tokens = parse("some **bold** and *soft* and ~~gone~~");
        let sequence = kinds(&tokens);
        let strong = sequence
            .iter()
            .position(|k| *k == MdTokenKind::Open(Container::Strong))
            .unwrap();
        assert_eq!(sequence[strong + 1], MdTokenKind::Text);
        assert_eq!(tokens[strong + 1].content, "bold");
        assert!(sequence.contains(&MdTokenKind::Open(Container::Em)));
        assert!(sequence.contains(&MdTokenKind::Open(Container::Del)));
        // The consolidated inline run still reads as one sentence.
        assert_eq!(tokens[1].content, "some bold and soft and gone");
    }

    #[test]
    fn links_and_images_are_consolidated() {
        let tokens = parse("see [docs](https://example.com) and ![logo](img.png)");
        let links = find(&tokens, MdTokenKind::Link);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].content, "docs");
        assert_eq!(
            links[0].attrs,
            vec![("href".to_string(), "https://example.com".to_string())]
        );
        let images = find(&tokens, MdTokenKind::Image);
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].content, "logo");
        assert_eq!(images[0].attrs, vec![("src".to_string(), "img.png".to_string())]);
    }

    #[test]
    fn blockquote_wraps_its_paragraphs() {
        let tokens = parse("> quoted text");
        assert_eq!(tokens[0].kind, MdTokenKind::Open(Container::Blockquote));
        let inlines = find(&tokens, MdTokenKind::Inline);
        assert_eq!(inlines[0].content, "quoted text");
        assert_eq!(
            tokens.last().map(|t| t.kind),
            Some(MdTokenKind::Close(Container::Blockquote))
        );
    }

    #[test]
    fn html_block_is_one_token() {
        let tokens = parse("<div>\nraw\n</div>");
        let blocks = find(&tokens, MdTokenKind::HtmlBlock);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].content.contains("<div>"));
        assert!(blocks[0].content.contains("raw"));
    }

    #[test]
    fn cache_returns_the_same_parse_for_the_same_text() {
        let first = parse_cached("cache me");
        let second = parse_cached("cache me");
        assert!(Arc::ptr_eq(&first, &second));
        let third = parse_cached("different");
        assert!(!Arc::ptr_eq(&first, &third));
    }
}
