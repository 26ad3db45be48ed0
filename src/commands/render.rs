//! Terminal rendering of chat messages
//!
//! Replies are markdown. The only structure rendered specially is fenced
//! code blocks, which are set apart from the prose with a gutter and color.

use crate::conversation::Message;
use colored::Colorize;
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};

/// A run of reply text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Ordinary text, rendered as-is
    Prose(String),
    /// Contents of a fenced code block
    Code {
        /// Info string after the opening fence, if any
        lang: Option<String>,
        /// Code lines, without the fences
        code: String,
    },
}

/// Split text into prose and fenced code segments
///
/// Fences are recognised by a CommonMark parser, so both backtick and tilde
/// fences work and a longer fence may contain shorter ones. An unterminated
/// fence runs to the end of the text. Prose is kept as written.
///
/// # Examples
///
/// ```
/// use chatline::commands::render::{split_segments, Segment};
///
/// let segments = split_segments("Try:\n```rust\nfn main() {}\n```\nDone.");
/// assert_eq!(segments.len(), 3);
/// assert_eq!(
///     segments[1],
///     Segment::Code { lang: Some("rust".into()), code: "fn main() {}".into() }
/// );
/// ```
pub fn split_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut prose_start = 0;
    let mut code: Option<(Option<String>, String)> = None;

    for (event, range) in Parser::new(text).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                push_prose(&mut segments, &text[prose_start..range.start]);
                let lang = info.split_whitespace().next().map(str::to_string);
                code = Some((lang, String::new()));
            }
            Event::Text(chunk) => {
                if let Some((_, body)) = code.as_mut() {
                    body.push_str(&chunk);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some((lang, body)) = code.take() {
                    segments.push(Segment::Code {
                        lang,
                        code: body.trim_end_matches('\n').to_string(),
                    });
                    prose_start = range.end;
                }
            }
            _ => {}
        }
    }

    push_prose(&mut segments, &text[prose_start..]);
    segments
}

fn push_prose(segments: &mut Vec<Segment>, prose: &str) {
    let prose = prose.trim_matches(|c: char| c == '\n' || c == '\r');
    if !prose.trim().is_empty() {
        segments.push(Segment::Prose(prose.to_string()));
    }
}

/// Render reply text for the terminal
pub fn render_reply(text: &str) -> String {
    let mut out = Vec::new();
    for segment in split_segments(text) {
        match segment {
            Segment::Prose(prose) => out.push(prose),
            Segment::Code { lang, code } => {
                let label = lang.unwrap_or_else(|| "code".to_string());
                out.push(format!("┌─ {}", label).dimmed().to_string());
                for line in code.lines() {
                    out.push(format!("{} {}", "│".dimmed(), line.cyan()));
                }
                out.push("└─".dimmed().to_string());
            }
        }
    }
    out.join("\n")
}

/// Render a stored message with its id and time, as shown by `/show`
pub fn render_message(message: &Message) -> String {
    let author = if message.is_user {
        "You".green().bold()
    } else {
        "Assistant".blue().bold()
    };
    let body = if message.is_user {
        message.content.clone()
    } else {
        render_reply(&message.content)
    };
    format!(
        "{} {} {}\n{}",
        author,
        message.timestamp.dimmed(),
        format!("#{}", message.id).dimmed(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_prose() {
        assert_eq!(
            split_segments("one\ntwo"),
            vec![Segment::Prose("one\ntwo".to_string())]
        );
    }

    #[test]
    fn test_split_code_without_language() {
        let segments = split_segments("```\nls -la\n```");
        assert_eq!(
            segments,
            vec![Segment::Code {
                lang: None,
                code: "ls -la".to_string()
            }]
        );
    }

    #[test]
    fn test_split_mixed() {
        let text = "Intro\n```python\nprint(1)\nprint(2)\n```\nOutro";
        assert_eq!(
            split_segments(text),
            vec![
                Segment::Prose("Intro".to_string()),
                Segment::Code {
                    lang: Some("python".to_string()),
                    code: "print(1)\nprint(2)".to_string()
                },
                Segment::Prose("Outro".to_string()),
            ]
        );
    }

    #[test]
    fn test_split_unterminated_fence() {
        let segments = split_segments("See:\n```js\nconsole.log(1)");
        assert_eq!(segments.len(), 2);
        assert_eq!(
            segments[1],
            Segment::Code {
                lang: Some("js".to_string()),
                code: "console.log(1)".to_string()
            }
        );
    }

    #[test]
    fn test_split_tilde_fence() {
        assert_eq!(
            split_segments("~~~python\nprint(1)\n~~~"),
            vec![Segment::Code {
                lang: Some("python".to_string()),
                code: "print(1)".to_string()
            }]
        );
    }

    #[test]
    fn test_split_longer_fence_contains_shorter() {
        let text = "````md\n```rust\nfn x(){}\n```\n````\nAfter";
        assert_eq!(
            split_segments(text),
            vec![
                Segment::Code {
                    lang: Some("md".to_string()),
                    code: "```rust\nfn x(){}\n```".to_string()
                },
                Segment::Prose("After".to_string()),
            ]
        );
    }

    #[test]
    fn test_split_keeps_markdown_in_prose() {
        assert_eq!(
            split_segments("**bold** and `inline`\n\n- item"),
            vec![Segment::Prose("**bold** and `inline`\n\n- item".to_string())]
        );
    }

    #[test]
    fn test_render_reply_keeps_code_lines() {
        let rendered = render_reply("Run:\n```sh\ncargo test\n```");
        assert!(rendered.contains("Run:"));
        assert!(rendered.contains("cargo test"));
        assert!(rendered.contains("sh"));
    }

    #[test]
    fn test_render_message_includes_id() {
        let message = Message::user("hello");
        let rendered = render_message(&message);
        assert!(rendered.contains(&message.id.to_string()));
        assert!(rendered.contains("hello"));
    }
}
