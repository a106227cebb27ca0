//! Reply formatting for the plan assistant.
//!
//! Replies use a small markdown subset: `#`/`##`/`###` headings, `-`/`*`
//! list items and `**strong**`/`*emphasis*` spans. Every other line is a
//! paragraph of its own; blank lines only close an open list.

use std::sync::OnceLock;

use regex::Regex;

pub const CHAT_INTRO: &str = "I'm your plan copilot. Ask how changing retirement age, savings, or income targets affects your outlook.";
pub const SUMMARY_PROMPT: &str = "Summarize this retirement plan in a short paragraph, then list the most important next steps as bullet points.";
pub const STATUS_THINKING: &str = "Thinking...";
pub const STATUS_FAILED: &str = "Unable to get a reply.";
pub const STATUS_PLAN_UPDATED: &str = "Plan updated. Ask what changed.";
pub const NETWORK_ERROR_REPLY: &str = "Network error. Please try again.";
pub const GENERIC_ERROR_REPLY: &str = "Something went wrong.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatFailure {
    Network,
    /// The endpoint answered without a `response`; `error` is its message, if any.
    Rejected { error: Option<String> },
}

impl ChatFailure {
    pub fn reply_text(&self) -> &str {
        match self {
            Self::Network => NETWORK_ERROR_REPLY,
            Self::Rejected { error } => error
                .as_deref()
                .map(str::trim)
                .filter(|error| !error.is_empty())
                .unwrap_or(GENERIC_ERROR_REPLY),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Emphasis(String),
    Strong(Vec<Inline>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Level 1 to 3, from `#` to `###`.
    Heading { level: u8, inlines: Vec<Inline> },
    List(Vec<Vec<Inline>>),
    Paragraph(Vec<Inline>),
}

pub fn parse_blocks(content: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut list: Option<Vec<Vec<Inline>>> = None;

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() {
            if let Some(items) = list.take() {
                blocks.push(Block::List(items));
            }
            continue;
        }
        if let Some(item) = strip_marker(line, "-").or_else(|| strip_marker(line, "*")) {
            list.get_or_insert_with(Vec::new).push(parse_inlines(item));
            continue;
        }
        if let Some(items) = list.take() {
            blocks.push(Block::List(items));
        }
        let heading = [(3u8, "###"), (2, "##"), (1, "#")]
            .into_iter()
            .find_map(|(level, marker)| strip_marker(line, marker).map(|text| (level, text)));
        match heading {
            Some((level, text)) => blocks.push(Block::Heading {
                level,
                inlines: parse_inlines(text),
            }),
            None => blocks.push(Block::Paragraph(parse_inlines(line))),
        }
    }
    if let Some(items) = list {
        blocks.push(Block::List(items));
    }
    blocks
}

/// `marker` followed by at least one whitespace character.
fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(marker)?;
    if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

static STRONG: OnceLock<Option<Regex>> = OnceLock::new();
static EMPHASIS: OnceLock<Option<Regex>> = OnceLock::new();

fn strong_pattern() -> Option<&'static Regex> {
    STRONG
        .get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").ok())
        .as_ref()
}

fn emphasis_pattern() -> Option<&'static Regex> {
    EMPHASIS
        .get_or_init(|| Regex::new(r"\*(.+?)\*").ok())
        .as_ref()
}

pub fn parse_inlines(text: &str) -> Vec<Inline> {
    let mut out = Vec::new();
    let Some(strong) = strong_pattern() else {
        push_emphasis(text, &mut out);
        return out;
    };
    let mut last = 0;
    for caps in strong.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_emphasis(&text[last..whole.start()], &mut out);
        let mut nested = Vec::new();
        push_emphasis(inner.as_str(), &mut nested);
        out.push(Inline::Strong(nested));
        last = whole.end();
    }
    push_emphasis(&text[last..], &mut out);
    out
}

fn push_emphasis(text: &str, out: &mut Vec<Inline>) {
    if text.is_empty() {
        return;
    }
    let Some(emphasis) = emphasis_pattern() else {
        out.push(Inline::Text(text.to_string()));
        return;
    };
    let mut last = 0;
    for caps in emphasis.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            out.push(Inline::Text(text[last..whole.start()].to_string()));
        }
        out.push(Inline::Emphasis(inner.as_str().to_string()));
        last = whole.end();
    }
    if last < text.len() {
        out.push(Inline::Text(text[last..].to_string()));
    }
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

fn inlines_to_html(inlines: &[Inline], out: &mut String) {
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(&escape_html(text)),
            Inline::Emphasis(text) => {
                out.push_str("<em>");
                out.push_str(&escape_html(text));
                out.push_str("</em>");
            }
            Inline::Strong(children) => {
                out.push_str("<strong>");
                inlines_to_html(children, out);
                out.push_str("</strong>");
            }
        }
    }
}

/// Headings render one level down (`#` is `<h2>`) to sit under the panel title.
pub fn blocks_to_html(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        match block {
            Block::Heading { level, inlines } => {
                let tag = format!("h{}", level.saturating_add(1).min(6));
                out.push_str(&format!("<{tag}>"));
                inlines_to_html(inlines, &mut out);
                out.push_str(&format!("</{tag}>"));
            }
            Block::List(items) => {
                out.push_str("<ul>");
                for item in items {
                    out.push_str("<li>");
                    inlines_to_html(item, &mut out);
                    out.push_str("</li>");
                }
                out.push_str("</ul>");
            }
            Block::Paragraph(inlines) => {
                out.push_str("<p>");
                inlines_to_html(inlines, &mut out);
                out.push_str("</p>");
            }
        }
    }
    out
}

pub fn format_chat_html(content: &str) -> String {
    blocks_to_html(&parse_blocks(content))
}

pub fn inline_text(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) | Inline::Emphasis(text) => out.push_str(text),
            Inline::Strong(children) => out.push_str(&inline_text(children)),
        }
    }
    out
}

/// Markup-free rendering for plain terminals and pipes.
pub fn format_chat_plain(content: &str) -> String {
    let mut lines = Vec::new();
    for block in parse_blocks(content) {
        match block {
            Block::Heading { inlines, .. } => lines.push(inline_text(&inlines).to_uppercase()),
            Block::List(items) => {
                for item in items {
                    lines.push(format!("  • {}", inline_text(&item)));
                }
            }
            Block::Paragraph(inlines) => lines.push(inline_text(&inlines)),
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn headings_lists_and_paragraphs() {
        let html = format_chat_html("# Outlook\n## Detail\n### Note\n- one\n* two\n\nPlain line");
        assert_eq!(
            html,
            "<h2>Outlook</h2><h3>Detail</h3><h4>Note</h4><ul><li>one</li><li>two</li></ul><p>Plain line</p>"
        );
    }

    #[test]
    fn blank_line_splits_lists() {
        let blocks = parse_blocks("- a\n\n- b");
        assert_eq!(
            blocks,
            vec![
                Block::List(vec![vec![Inline::Text("a".to_string())]]),
                Block::List(vec![vec![Inline::Text("b".to_string())]]),
            ]
        );
    }

    #[test]
    fn emphasis_spans() {
        assert_eq!(
            format_chat_html("Save **more** each *month*"),
            "<p>Save <strong>more</strong> each <em>month</em></p>"
        );
        assert_eq!(
            format_chat_html("**bold *nested* text**"),
            "<p><strong>bold <em>nested</em> text</strong></p>"
        );
        assert_eq!(
            parse_inlines("**Note:** text"),
            vec![
                Inline::Strong(vec![Inline::Text("Note:".to_string())]),
                Inline::Text(" text".to_string()),
            ]
        );
    }

    #[test]
    fn markers_need_trailing_whitespace() {
        assert_eq!(format_chat_html("#hashtag"), "<p>#hashtag</p>");
        assert_eq!(format_chat_html("-5% return"), "<p>-5% return</p>");
    }

    #[test]
    fn raw_text_is_escaped() {
        let html = format_chat_html("<script>alert('x')</script> & \"**<b>**\"");
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>"));
        assert_eq!(
            html,
            "<p>&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; &quot;<strong>&lt;b&gt;</strong>&quot;</p>"
        );
    }

    #[test]
    fn plain_rendering_strips_markup() {
        assert_eq!(
            format_chat_plain("## Next steps\n- Save **$200** more\nDone *soon*"),
            "NEXT STEPS\n  • Save $200 more\nDone soon"
        );
    }
}
