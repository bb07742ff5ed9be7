//! Extraction of directive blocks from free-form assistant text.
//!
//! A directive opens with a line whose first non-blank characters are `>>>`
//! followed by an upper-case kind word, and closes with `<<<`:
//!
//! ```text
//! >>> WRITE src/main.js
//! console.log("hi");
//! <<<
//! >>> RUN npm test <<<
//! >>> CREATE vite-react-ts web <<<
//! >>> SHADCN button card <<<
//! >>> REFRESH <<<
//! ```
//!
//! WRITE is the only block kind: its body runs until a line consisting solely
//! of `<<<`. Every other kind is single-line and must close on its open line.
//! Parsing is resilient per block: a malformed block is reported and scanning
//! resumes after it.

use serde::Serialize;
use std::fmt;
use std::ops::Range;

pub const OPEN_MARKER: &str = ">>>";
pub const CLOSE_MARKER: &str = "<<<";

const PACKAGE_MANAGERS: &[&str] = &["npm", "pnpm", "yarn", "bun"];

// ---------------------------------------------------------------------------
// DirectiveKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DirectiveKind {
    Write,
    Run,
    Delete,
    Create,
    Read,
    Install,
    Cd,
    Tree,
    Shadcn,
    Refresh,
    ListFiles,
}

impl DirectiveKind {
    pub fn all() -> &'static [DirectiveKind] {
        &[
            DirectiveKind::Write,
            DirectiveKind::Run,
            DirectiveKind::Delete,
            DirectiveKind::Create,
            DirectiveKind::Read,
            DirectiveKind::Install,
            DirectiveKind::Cd,
            DirectiveKind::Tree,
            DirectiveKind::Shadcn,
            DirectiveKind::Refresh,
            DirectiveKind::ListFiles,
        ]
    }

    /// The marker word as it appears after `>>>`.
    pub fn as_str(self) -> &'static str {
        match self {
            DirectiveKind::Write => "WRITE",
            DirectiveKind::Run => "RUN",
            DirectiveKind::Delete => "DELETE",
            DirectiveKind::Create => "CREATE",
            DirectiveKind::Read => "READ",
            DirectiveKind::Install => "INSTALL",
            DirectiveKind::Cd => "CD",
            DirectiveKind::Tree => "TREE",
            DirectiveKind::Shadcn => "SHADCN",
            DirectiveKind::Refresh => "REFRESH",
            DirectiveKind::ListFiles => "LISTFILES",
        }
    }

    pub fn from_marker(word: &str) -> Option<DirectiveKind> {
        DirectiveKind::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == word)
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Directive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    Write {
        path: String,
        content: String,
    },
    Run {
        command: String,
    },
    Delete {
        path: String,
    },
    Create {
        template: String,
        name: String,
        options: Option<String>,
    },
    Read {
        path: String,
    },
    Install {
        packages: Vec<String>,
    },
    Cd {
        path: String,
    },
    Tree,
    /// Add shadcn/ui components to the project in the working directory.
    Shadcn {
        components: Vec<String>,
    },
    /// Rescan the project and replace the assistant's context.
    Refresh,
    ListFiles,
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Write { .. } => DirectiveKind::Write,
            Directive::Run { .. } => DirectiveKind::Run,
            Directive::Delete { .. } => DirectiveKind::Delete,
            Directive::Create { .. } => DirectiveKind::Create,
            Directive::Read { .. } => DirectiveKind::Read,
            Directive::Install { .. } => DirectiveKind::Install,
            Directive::Cd { .. } => DirectiveKind::Cd,
            Directive::Tree => DirectiveKind::Tree,
            Directive::Shadcn { .. } => DirectiveKind::Shadcn,
            Directive::Refresh => DirectiveKind::Refresh,
            Directive::ListFiles => DirectiveKind::ListFiles,
        }
    }

    /// Short human label: the path, command, or template the directive targets.
    pub fn target(&self) -> String {
        match self {
            Directive::Write { path, .. }
            | Directive::Delete { path }
            | Directive::Read { path }
            | Directive::Cd { path } => path.clone(),
            Directive::Run { command } => command.clone(),
            Directive::Create { template, name, .. } => format!("{template} {name}"),
            Directive::Install { packages } => packages.join(" "),
            Directive::Shadcn { components } => components.join(" "),
            Directive::Tree | Directive::Refresh | Directive::ListFiles => ".".to_string(),
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.target())
    }
}

/// A directive together with where it came from in the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedDirective {
    pub directive: Directive,
    pub span: Range<usize>,
    pub raw: String,
}

// ---------------------------------------------------------------------------
// Malformed directives
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum MalformedReason {
    #[error("unknown directive kind '{0}'")]
    UnknownKind(String),

    #[error("missing directive kind after '>>>'")]
    MissingKind,

    #[error("{0} directive is missing its payload")]
    MissingPayload(DirectiveKind),

    #[error("{0} directive must close with '<<<' on the same line")]
    MissingCloseMarker(DirectiveKind),

    #[error("directive is never closed with '<<<'")]
    Unterminated,

    #[error("{0} block contains another directive before its '<<<'")]
    NestedOpen(DirectiveKind),

    #[error("'>>>' marker must start a line")]
    InlineMarker,

    #[error("unexpected text after '<<<' in {0} directive")]
    UnexpectedTrailing(DirectiveKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("malformed directive at byte {}: {reason}", span.start)]
pub struct MalformedDirective {
    pub reason: MalformedReason,
    pub span: Range<usize>,
    pub raw: String,
}

pub type ParseItem = std::result::Result<ParsedDirective, MalformedDirective>;

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Lazy, restartable scan over a complete piece of text.
pub fn parse(text: &str) -> DirectiveParser<'_> {
    DirectiveParser {
        text,
        pos: 0,
        complete: true,
    }
}

pub struct DirectiveParser<'a> {
    text: &'a str,
    pos: usize,
    /// False while more text may still arrive: an open line without a
    /// newline is then reported as `Unterminated` instead of being judged.
    complete: bool,
}

enum Open<'a> {
    Skip,
    Malformed(MalformedReason, usize, usize),
    Kind {
        kind: DirectiveKind,
        payload: &'a str,
        payload_start: usize,
        line_end: usize,
        has_newline: bool,
    },
}

struct Line {
    start: usize,
    end: usize,
    next: usize,
    has_newline: bool,
}

impl<'a> DirectiveParser<'a> {
    fn line_at(&self, start: usize) -> Line {
        match self.text[start..].find('\n') {
            Some(i) => Line {
                start,
                end: start + i,
                next: start + i + 1,
                has_newline: true,
            },
            None => Line {
                start,
                end: self.text.len(),
                next: self.text.len(),
                has_newline: false,
            },
        }
    }

    fn malformed(&self, reason: MalformedReason, span: Range<usize>) -> MalformedDirective {
        MalformedDirective {
            reason,
            raw: self.text[span.clone()].to_string(),
            span,
        }
    }

    /// Classify the text following a `>>>` marker that starts a line.
    fn scan_open(&self, marker: usize) -> Open<'a> {
        let text: &'a str = self.text;
        let line = self.line_at(marker);
        let after = &text[marker + OPEN_MARKER.len()..line.end];

        if !line.has_newline && !self.complete {
            return Open::Malformed(MalformedReason::Unterminated, line.end, line.next);
        }

        let word_src = after.trim_start_matches([' ', '\t']);
        let word_start = line.end - word_src.len();
        let word_len = word_src
            .find(|c: char| c.is_whitespace() || c == '<')
            .unwrap_or(word_src.len());
        let word = &word_src[..word_len];
        let has_close = after.contains(CLOSE_MARKER);

        if word.is_empty() {
            return if has_close {
                Open::Malformed(MalformedReason::MissingKind, line.end, line.next)
            } else {
                Open::Skip
            };
        }

        match DirectiveKind::from_marker(word) {
            Some(kind) => Open::Kind {
                kind,
                payload: &text[word_start + word_len..line.end],
                payload_start: word_start + word_len,
                line_end: line.end,
                has_newline: line.has_newline,
            },
            None if looks_like_kind(word) || has_close => Open::Malformed(
                MalformedReason::UnknownKind(word.to_string()),
                line.end,
                line.next,
            ),
            // Prose or a REPL transcript line such as `>>> print(x)`.
            None => Open::Skip,
        }
    }

    fn parse_at(&mut self, marker: usize) -> Option<ParseItem> {
        match self.scan_open(marker) {
            Open::Skip => {
                self.pos = marker + OPEN_MARKER.len();
                None
            }
            Open::Malformed(reason, span_end, next) => {
                self.pos = next;
                Some(Err(self.malformed(reason, marker..span_end)))
            }
            Open::Kind {
                kind: DirectiveKind::Write,
                payload,
                line_end,
                has_newline,
                ..
            } => Some(self.parse_write(marker, payload, line_end, has_newline)),
            Open::Kind {
                kind,
                payload,
                payload_start,
                line_end,
                has_newline,
            } => Some(self.parse_single_line(
                marker,
                kind,
                payload,
                payload_start,
                line_end,
                has_newline,
            )),
        }
    }

    fn parse_single_line(
        &mut self,
        marker: usize,
        kind: DirectiveKind,
        payload: &str,
        payload_start: usize,
        line_end: usize,
        has_newline: bool,
    ) -> ParseItem {
        let next_line = if has_newline { line_end + 1 } else { line_end };
        self.pos = next_line;

        let Some(close) = payload.find(CLOSE_MARKER) else {
            let reason = if has_newline {
                MalformedReason::MissingCloseMarker(kind)
            } else {
                MalformedReason::Unterminated
            };
            return Err(self.malformed(reason, marker..line_end));
        };

        let span = marker..payload_start + close + CLOSE_MARKER.len();
        if !payload[close + CLOSE_MARKER.len()..].trim().is_empty() {
            return Err(self.malformed(MalformedReason::UnexpectedTrailing(kind), marker..line_end));
        }

        match build_single_line(kind, payload[..close].trim()) {
            Some(directive) => Ok(ParsedDirective {
                directive,
                raw: self.text[span.clone()].to_string(),
                span,
            }),
            None => Err(self.malformed(MalformedReason::MissingPayload(kind), span)),
        }
    }

    fn parse_write(
        &mut self,
        marker: usize,
        header: &str,
        line_end: usize,
        has_newline: bool,
    ) -> ParseItem {
        if let Some(close) = header.find(CLOSE_MARKER) {
            // `>>> WRITE path <<<` carries no body.
            let span_end = line_end - (header.len() - close - CLOSE_MARKER.len());
            self.pos = if has_newline { line_end + 1 } else { line_end };
            return Err(self.malformed(
                MalformedReason::MissingPayload(DirectiveKind::Write),
                marker..span_end,
            ));
        }
        if !has_newline {
            self.pos = line_end;
            return Err(self.malformed(MalformedReason::Unterminated, marker..line_end));
        }

        let path = header.trim();
        let body_start = line_end + 1;
        let mut cursor = body_start;

        while cursor < self.text.len() {
            let line = self.line_at(cursor);
            let content = &self.text[line.start..line.end];

            if content.trim() == CLOSE_MARKER && (line.has_newline || self.complete) {
                self.pos = line.next;
                let span = marker..line.end;
                if path.is_empty() {
                    return Err(self.malformed(
                        MalformedReason::MissingPayload(DirectiveKind::Write),
                        span,
                    ));
                }
                return Ok(ParsedDirective {
                    directive: Directive::Write {
                        path: path.to_string(),
                        content: self.text[body_start..line.start].to_string(),
                    },
                    raw: self.text[span.clone()].to_string(),
                    span,
                });
            }

            // A partial last line may still grow into plain body text.
            if (line.has_newline || self.complete) && opens_known_directive(content) {
                // Resume scanning at the nested marker line.
                self.pos = line.start;
                return Err(self.malformed(
                    MalformedReason::NestedOpen(DirectiveKind::Write),
                    marker..line.start,
                ));
            }

            if !line.has_newline {
                break;
            }
            cursor = line.next;
        }

        self.pos = self.text.len();
        Err(self.malformed(MalformedReason::Unterminated, marker..self.text.len()))
    }
}

impl<'a> Iterator for DirectiveParser<'a> {
    type Item = ParseItem;

    fn next(&mut self) -> Option<ParseItem> {
        loop {
            if self.pos >= self.text.len() {
                return None;
            }
            let Some(rel) = self.text[self.pos..].find(OPEN_MARKER) else {
                self.pos = self.text.len();
                return None;
            };
            let marker = self.pos + rel;

            // `>>>>` and longer runs are not markers.
            if self.text[marker + OPEN_MARKER.len()..].starts_with('>') {
                self.pos = marker + OPEN_MARKER.len() + 1;
                continue;
            }

            let line_start = self.text[..marker].rfind('\n').map_or(0, |i| i + 1);
            if !self.text[line_start..marker].trim().is_empty() {
                let after = &self.text[marker + OPEN_MARKER.len()..];
                let word = after
                    .trim_start_matches([' ', '\t'])
                    .split(|c: char| c.is_whitespace() || c == '<')
                    .next()
                    .unwrap_or("");
                if DirectiveKind::from_marker(word).is_some() {
                    let line = self.line_at(marker);
                    if !line.has_newline && !self.complete {
                        // The line may still grow; wait for it.
                        self.pos = line.next;
                        return Some(Err(
                            self.malformed(MalformedReason::Unterminated, marker..line.end)
                        ));
                    }
                    self.pos = line.next;
                    return Some(Err(
                        self.malformed(MalformedReason::InlineMarker, marker..line.end)
                    ));
                }
                self.pos = marker + OPEN_MARKER.len();
                continue;
            }

            if let Some(item) = self.parse_at(marker) {
                return Some(item);
            }
        }
    }
}

fn looks_like_kind(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

fn opens_known_directive(line: &str) -> bool {
    let Some(rest) = line.trim_start().strip_prefix(OPEN_MARKER) else {
        return false;
    };
    if rest.starts_with('>') {
        return false;
    }
    let word = rest
        .trim_start_matches([' ', '\t'])
        .split(|c: char| c.is_whitespace() || c == '<')
        .next()
        .unwrap_or("");
    DirectiveKind::from_marker(word).is_some()
}

fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim()),
        None => (s, ""),
    }
}

fn build_single_line(kind: DirectiveKind, payload: &str) -> Option<Directive> {
    match kind {
        DirectiveKind::Tree => Some(Directive::Tree),
        DirectiveKind::Refresh => Some(Directive::Refresh),
        DirectiveKind::ListFiles => Some(Directive::ListFiles),
        _ if payload.is_empty() => None,
        DirectiveKind::Run => Some(Directive::Run {
            command: payload.to_string(),
        }),
        DirectiveKind::Delete => Some(Directive::Delete {
            path: payload.to_string(),
        }),
        DirectiveKind::Read => Some(Directive::Read {
            path: payload.to_string(),
        }),
        DirectiveKind::Cd => Some(Directive::Cd {
            path: payload.to_string(),
        }),
        DirectiveKind::Create => {
            let (template, rest) = split_first_word(payload);
            let (name, options) = split_first_word(rest);
            if name.is_empty() {
                return None;
            }
            Some(Directive::Create {
                template: template.to_string(),
                name: name.to_string(),
                options: (!options.is_empty()).then(|| options.to_string()),
            })
        }
        DirectiveKind::Install => {
            let mut words: Vec<&str> = payload.split_whitespace().collect();
            if words.len() > 1 && PACKAGE_MANAGERS.contains(&words[0]) {
                words.remove(0);
            }
            Some(Directive::Install {
                packages: words.into_iter().map(str::to_string).collect(),
            })
        }
        DirectiveKind::Shadcn => Some(Directive::Shadcn {
            components: payload.split_whitespace().map(str::to_string).collect(),
        }),
        DirectiveKind::Write => None,
    }
}

// ---------------------------------------------------------------------------
// Streaming buffer
// ---------------------------------------------------------------------------

/// Accumulates streamed chunks and releases directives once their block is
/// complete. Nothing is released for a block whose close marker (or line end)
/// has not arrived yet.
#[derive(Debug, Default)]
pub struct DirectiveBuffer {
    text: String,
    pos: usize,
}

impl DirectiveBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> Vec<ParseItem> {
        self.text.push_str(chunk);
        let mut out = Vec::new();
        let mut parser = DirectiveParser {
            text: &self.text,
            pos: self.pos,
            complete: false,
        };
        loop {
            let before = parser.pos;
            match parser.next() {
                None => {
                    // A marker may be split across chunks; rescan from here.
                    self.pos = before;
                    break;
                }
                Some(Err(m)) if m.reason == MalformedReason::Unterminated => {
                    self.pos = before;
                    break;
                }
                Some(item) => {
                    out.push(item);
                    self.pos = parser.pos;
                }
            }
        }
        out
    }

    /// Flush everything still buffered, judging it as complete text.
    pub fn finish(self) -> (String, Vec<ParseItem>) {
        let items = DirectiveParser {
            text: &self.text,
            pos: self.pos,
            complete: true,
        }
        .collect();
        (self.text, items)
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The conversational part of a response with every directive block removed.
pub fn strip_directives(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for item in parse(text) {
        let span = match item {
            Ok(d) => d.span,
            Err(m) => m.span,
        };
        out.push_str(&text[last..span.start]);
        last = span.end;
    }
    out.push_str(&text[last..]);

    let mut cleaned = String::with_capacity(out.len());
    let mut blank_run = 0;
    for line in out.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        cleaned.push_str(line);
        cleaned.push('\n');
    }
    cleaned.trim().to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn directives(text: &str) -> Vec<Directive> {
        parse(text).filter_map(|r| r.ok()).map(|p| p.directive).collect()
    }

    fn reasons(text: &str) -> Vec<MalformedReason> {
        parse(text).filter_map(|r| r.err()).map(|m| m.reason).collect()
    }

    #[test]
    fn write_block_keeps_body_verbatim() {
        let parsed: Vec<_> = parse(">>> WRITE a.txt\nhello\n<<<").collect();
        assert_eq!(parsed.len(), 1);
        let p = parsed[0].as_ref().unwrap();
        assert_eq!(
            p.directive,
            Directive::Write {
                path: "a.txt".into(),
                content: "hello\n".into()
            }
        );
        assert_eq!(p.raw, ">>> WRITE a.txt\nhello\n<<<");
    }

    #[test]
    fn write_body_preserves_indentation_and_blank_lines() {
        let text = "Here you go:\n>>> WRITE src/app.py\ndef main():\n\n    return 1\n<<<\nDone.";
        assert_eq!(
            directives(text),
            vec![Directive::Write {
                path: "src/app.py".into(),
                content: "def main():\n\n    return 1\n".into()
            }]
        );
    }

    #[test]
    fn empty_write_body_is_allowed() {
        assert_eq!(
            directives(">>> WRITE empty.txt\n<<<\n"),
            vec![Directive::Write {
                path: "empty.txt".into(),
                content: String::new()
            }]
        );
    }

    #[test]
    fn single_line_kinds() {
        let text = "\
>>> RUN npm test <<<
>>> DELETE old.js <<<
>>> CREATE vite-react-ts web --force <<<
>>> READ src/ <<<
>>> INSTALL npm react react-dom <<<
>>> CD web <<<
>>> TREE <<<
";
        assert_eq!(
            directives(text),
            vec![
                Directive::Run {
                    command: "npm test".into()
                },
                Directive::Delete {
                    path: "old.js".into()
                },
                Directive::Create {
                    template: "vite-react-ts".into(),
                    name: "web".into(),
                    options: Some("--force".into())
                },
                Directive::Read {
                    path: "src/".into()
                },
                Directive::Install {
                    packages: vec!["react".into(), "react-dom".into()]
                },
                Directive::Cd { path: "web".into() },
                Directive::Tree,
            ]
        );
    }

    #[test]
    fn shadcn_refresh_and_listfiles() {
        let text = ">>> SHADCN button card <<<\n>>> REFRESH <<<\n>>> LISTFILES <<<\n";
        assert_eq!(
            directives(text),
            vec![
                Directive::Shadcn {
                    components: vec!["button".into(), "card".into()]
                },
                Directive::Refresh,
                Directive::ListFiles,
            ]
        );
        assert_eq!(
            reasons(">>> SHADCN <<<"),
            vec![MalformedReason::MissingPayload(DirectiveKind::Shadcn)]
        );
    }

    #[test]
    fn directives_come_out_in_document_order() {
        let text = ">>> RUN a <<<\n>>> WRITE x\n1\n<<<\n>>> RUN b <<<";
        let kinds: Vec<_> = directives(text).iter().map(Directive::kind).collect();
        assert_eq!(
            kinds,
            vec![DirectiveKind::Run, DirectiveKind::Write, DirectiveKind::Run]
        );
    }

    #[test]
    fn missing_close_does_not_hide_next_block() {
        let text = ">>> DELETE a.txt\nsome prose\n>>> WRITE b.txt\nhi\n<<<\n";
        let items: Vec<_> = parse(text).collect();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].as_ref().unwrap_err().reason,
            MalformedReason::MissingCloseMarker(DirectiveKind::Delete)
        );
        assert_eq!(
            items[1].as_ref().unwrap().directive,
            Directive::Write {
                path: "b.txt".into(),
                content: "hi\n".into()
            }
        );
    }

    #[test]
    fn unclosed_write_before_next_directive_is_nested_open() {
        let text = ">>> WRITE a.txt\nline\n>>> RUN ls <<<\n";
        let items: Vec<_> = parse(text).collect();
        assert_eq!(
            items[0].as_ref().unwrap_err().reason,
            MalformedReason::NestedOpen(DirectiveKind::Write)
        );
        assert_eq!(
            items[1].as_ref().unwrap().directive,
            Directive::Run {
                command: "ls".into()
            }
        );
    }

    #[test]
    fn unclosed_write_at_end_is_unterminated() {
        assert_eq!(
            reasons(">>> WRITE a.txt\nhello\n"),
            vec![MalformedReason::Unterminated]
        );
    }

    #[test]
    fn unknown_kind_is_reported_and_skipped() {
        let text = ">>> DEPLOY prod <<<\n>>> RUN ls <<<";
        assert_eq!(
            reasons(text),
            vec![MalformedReason::UnknownKind("DEPLOY".into())]
        );
        assert_eq!(directives(text).len(), 1);
    }

    #[test]
    fn lowercase_kind_with_close_is_unknown() {
        assert_eq!(
            reasons(">>> write a.txt <<<"),
            vec![MalformedReason::UnknownKind("write".into())]
        );
    }

    #[test]
    fn repl_transcript_lines_are_not_directives() {
        let text = "Try this:\n>>> print(1 + 1)\n2\n";
        assert!(parse(text).next().is_none());
    }

    #[test]
    fn inline_marker_is_malformed() {
        let text = "Use `>>> RUN ls <<<` to list files.";
        assert_eq!(reasons(text), vec![MalformedReason::InlineMarker]);
    }

    #[test]
    fn trailing_text_after_close_is_malformed() {
        assert_eq!(
            reasons(">>> RUN ls <<< and more"),
            vec![MalformedReason::UnexpectedTrailing(DirectiveKind::Run)]
        );
    }

    #[test]
    fn create_requires_name() {
        assert_eq!(
            reasons(">>> CREATE vite-react <<<"),
            vec![MalformedReason::MissingPayload(DirectiveKind::Create)]
        );
    }

    #[test]
    fn write_without_body_is_malformed() {
        assert_eq!(
            reasons(">>> WRITE a.txt <<<\n"),
            vec![MalformedReason::MissingPayload(DirectiveKind::Write)]
        );
    }

    #[test]
    fn empty_marker_with_close_is_missing_kind() {
        assert_eq!(reasons(">>> <<<"), vec![MalformedReason::MissingKind]);
    }

    #[test]
    fn install_without_manager_keeps_all_packages() {
        assert_eq!(
            directives(">>> INSTALL zod <<<"),
            vec![Directive::Install {
                packages: vec!["zod".into()]
            }]
        );
    }

    #[test]
    fn buffer_waits_for_close_marker() {
        let mut buf = DirectiveBuffer::new();
        assert!(buf.push("Sure.\n>>> WRITE a.txt\nhel").is_empty());
        assert!(buf.push("lo\n").is_empty());
        let items = buf.push("<<<\n>>> RU");
        assert_eq!(items.len(), 1);
        assert!(items[0].is_ok());
        assert!(buf.push("N ls <").is_empty());
        let items = buf.push("<<\n");
        assert_eq!(
            items[0].as_ref().unwrap().directive,
            Directive::Run {
                command: "ls".into()
            }
        );
        let (text, rest) = buf.finish();
        assert!(rest.is_empty());
        assert!(text.ends_with(">>> RUN ls <<<\n"));
    }

    #[test]
    fn buffer_does_not_judge_a_growing_body_line() {
        let mut buf = DirectiveBuffer::new();
        assert!(buf.push(">>> WRITE flags.py\nprint(1)\n>>> RUN").is_empty());
        assert!(buf.push("NING = True\n").is_empty());
        let items = buf.push("<<<\n");
        assert_eq!(
            items,
            vec![Ok(ParsedDirective {
                directive: Directive::Write {
                    path: "flags.py".into(),
                    content: "print(1)\n>>> RUNNING = True\n".into(),
                },
                span: 0..50,
                raw: ">>> WRITE flags.py\nprint(1)\n>>> RUNNING = True\n<<<".into(),
            })]
        );
    }

    #[test]
    fn buffer_handles_marker_split_across_chunks() {
        let mut buf = DirectiveBuffer::new();
        assert!(buf.push("ok >").is_empty());
        assert!(buf.push(">").is_empty());
        assert!(buf.push("\n>").is_empty());
        assert!(buf.push(">> TREE <<<").is_empty());
        let (_, rest) = buf.finish();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].as_ref().unwrap().directive, Directive::Tree);
    }

    #[test]
    fn buffer_finish_reports_unclosed_block() {
        let mut buf = DirectiveBuffer::new();
        buf.push(">>> WRITE a.txt\nhello\n");
        let (_, rest) = buf.finish();
        assert_eq!(
            rest[0].as_ref().unwrap_err().reason,
            MalformedReason::Unterminated
        );
    }

    #[test]
    fn strip_directives_keeps_prose() {
        let text = "I'll create the file.\n\n>>> WRITE a.txt\nhello\n<<<\n\nThen run it:\n>>> RUN node a.txt <<<\n";
        assert_eq!(
            strip_directives(text),
            "I'll create the file.\n\nThen run it:"
        );
    }

    #[test]
    fn kind_markers_round_trip() {
        for kind in DirectiveKind::all() {
            assert_eq!(DirectiveKind::from_marker(kind.as_str()), Some(*kind));
        }
    }
}
