//! Front matter and markdown structure analysis
//!
//! Uses pulldown-cmark's offset iterator so every element carries an
//! absolute byte span into the analyzed document. Front matter is split off
//! first and parsed with serde_yaml.

use pulldown_cmark::{CodeBlockKind, Event, LinkType, Options, Parser as MdParser, Tag, TagEnd};
use std::ops::Range;

/// Parsed front matter block
#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    /// Whole block including both `---` marker lines
    pub span: Range<usize>,
    /// YAML text between the markers
    pub raw_span: Range<usize>,
    /// Top-level fields
    pub fields: serde_yaml::Mapping,
}

impl FrontMatter {
    /// Look up a top-level field
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&serde_yaml::Value> {
        self.fields.get(key)
    }

    /// Whether a field is present and non-null
    #[must_use]
    pub fn has_field(&self, key: &str) -> bool {
        self.field(key).is_some_and(|v| !v.is_null())
    }
}

/// Outcome of front matter detection
#[derive(Debug, Clone, PartialEq)]
pub enum FrontMatterState {
    /// Document does not start with a `---` marker
    Absent,
    /// Well-formed block
    Present(FrontMatter),
    /// Marker present but block unterminated or not a YAML mapping
    Malformed(String),
}

impl FrontMatterState {
    /// Parsed block, if well-formed
    #[must_use]
    pub fn as_present(&self) -> Option<&FrontMatter> {
        match self {
            Self::Present(fm) => Some(fm),
            _ => None,
        }
    }

    /// Whether an opening marker exists (well-formed or not)
    #[must_use]
    pub fn is_declared(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

/// Heading element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Level 1-6
    pub level: u8,
    /// Plain heading text
    pub text: String,
    /// Byte span of the heading line
    pub span: Range<usize>,
}

/// Code block element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlockInfo {
    /// Fence language tag, if any
    pub language: Option<String>,
    /// Byte span including fences
    pub span: Range<usize>,
}

/// Paragraph element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    /// Plain paragraph text
    pub text: String,
    /// Byte span
    pub span: Range<usize>,
}

/// Inventory of structural elements in a document or fragment
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentStructure {
    pub front_matter: FrontMatterState,
    pub headings: Vec<Heading>,
    pub code_blocks: Vec<CodeBlockInfo>,
    pub paragraphs: Vec<Paragraph>,
    pub ordered_list_items: usize,
    pub unordered_list_items: usize,
    /// Header row plus body rows across all tables
    pub table_rows: usize,
    /// Link destinations in document order
    pub links: Vec<String>,
    /// A fenced code block runs to the end of input without a closing fence
    pub unbalanced_fences: bool,
}

impl DocumentStructure {
    /// Analyze a whole document, front matter included
    #[must_use]
    pub fn analyze(content: &str) -> Self {
        let front_matter = parse_front_matter(content);
        let body_offset = front_matter.as_present().map_or(0, |fm| fm.span.end);
        let mut structure = Self::scan(&content[body_offset..], body_offset);
        structure.front_matter = front_matter;
        structure
    }

    /// Analyze a fragment cut from the middle of a document
    ///
    /// Front matter detection is skipped.
    #[must_use]
    pub fn analyze_fragment(text: &str) -> Self {
        Self::scan(text, 0)
    }

    /// Headings of level 1 and 2
    pub fn major_headings(&self) -> impl Iterator<Item = &Heading> {
        self.headings.iter().filter(|h| h.level <= 2)
    }

    /// Number of code blocks
    #[inline]
    #[must_use]
    pub fn code_block_count(&self) -> usize {
        self.code_blocks.len()
    }

    /// Body text start (after front matter, if any)
    #[must_use]
    pub fn body_start(&self) -> usize {
        self.front_matter.as_present().map_or(0, |fm| fm.span.end)
    }

    fn scan(text: &str, offset: usize) -> Self {
        let mut headings = Vec::new();
        let mut code_blocks = Vec::new();
        let mut paragraphs = Vec::new();
        let mut links = Vec::new();
        let mut ordered_list_items = 0;
        let mut unordered_list_items = 0;
        let mut table_rows = 0;

        let mut list_stack: Vec<bool> = Vec::new();
        let mut heading: Option<(u8, usize, String)> = None;
        let mut paragraph: Option<(usize, String)> = None;
        let mut code: Option<(Option<String>, usize, bool)> = None;
        let mut unbalanced_fences = false;

        for (event, range) in MdParser::new_ext(text, Options::ENABLE_TABLES).into_offset_iter() {
            match event {
                Event::Start(Tag::Heading { level, .. }) => {
                    heading = Some((level as u8, range.start, String::new()));
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some((level, start, title)) = heading.take() {
                        headings.push(Heading {
                            level,
                            text: title.trim().to_string(),
                            span: offset + start..offset + range.end,
                        });
                    }
                }
                Event::Start(Tag::Paragraph) => paragraph = Some((range.start, String::new())),
                Event::End(TagEnd::Paragraph) => {
                    if let Some((start, body)) = paragraph.take() {
                        paragraphs.push(Paragraph {
                            text: body,
                            span: offset + start..offset + range.end,
                        });
                    }
                }
                Event::Start(Tag::CodeBlock(kind)) => {
                    let fenced = matches!(kind, CodeBlockKind::Fenced(_));
                    let language = match kind {
                        CodeBlockKind::Fenced(lang) if !lang.is_empty() => Some(lang.to_string()),
                        _ => None,
                    };
                    code = Some((language, range.start, fenced));
                }
                Event::End(TagEnd::CodeBlock) => {
                    if let Some((language, start, fenced)) = code.take() {
                        let at_end = text[range.end..].trim().is_empty();
                        if fenced && at_end && !fence_closed(&text[start..range.end]) {
                            unbalanced_fences = true;
                        }
                        code_blocks.push(CodeBlockInfo {
                            language,
                            span: offset + start..offset + range.end,
                        });
                    }
                }
                Event::Start(Tag::List(first)) => list_stack.push(first.is_some()),
                Event::End(TagEnd::List(_)) => {
                    list_stack.pop();
                }
                Event::Start(Tag::Item) => {
                    if list_stack.last() == Some(&true) {
                        ordered_list_items += 1;
                    } else {
                        unordered_list_items += 1;
                    }
                }
                Event::Start(Tag::TableHead | Tag::TableRow) => table_rows += 1,
                Event::Start(Tag::Link { dest_url, .. }) => links.push(dest_url.to_string()),
                Event::Text(t) | Event::Code(t) => {
                    if let Some((_, _, ref mut title)) = heading {
                        title.push_str(&t);
                    } else if let Some((_, ref mut body)) = paragraph {
                        body.push_str(&t);
                    }
                }
                Event::SoftBreak | Event::HardBreak => {
                    if let Some((_, ref mut body)) = paragraph {
                        body.push(' ');
                    }
                }
                _ => {}
            }
        }

        Self {
            front_matter: FrontMatterState::Absent,
            headings,
            code_blocks,
            paragraphs,
            ordered_list_items,
            unordered_list_items,
            table_rows,
            links,
            unbalanced_fences,
        }
    }
}

/// Whether a fenced block's source ends with a fence matching its opener
///
/// A closing fence uses the opener's character and is at least as long.
fn fence_closed(block: &str) -> bool {
    fn strip(line: &str) -> &str {
        line.trim_start_matches(|c: char| c == '>' || c.is_whitespace()).trim_end()
    }

    let mut lines = block.trim_end().lines();
    let Some(open) = lines.next().map(strip) else {
        return false;
    };
    let Some(marker) = open.chars().next() else {
        return false;
    };
    let width = open.chars().take_while(|c| *c == marker).count();
    lines.last().map(strip).is_some_and(|close| {
        close.chars().count() >= width && close.chars().all(|c| c == marker)
    })
}

/// Text a reader sees as prose
///
/// Code blocks, inline code, raw HTML, autolinks and link destinations are
/// left out. Block boundaries become a single space.
#[must_use]
pub fn prose_text(text: &str) -> String {
    let mut prose = String::with_capacity(text.len());
    let mut in_code = false;
    let mut in_autolink = false;

    for event in MdParser::new_ext(text, Options::ENABLE_TABLES) {
        match event {
            Event::Start(Tag::CodeBlock(_)) => in_code = true,
            Event::End(TagEnd::CodeBlock) => {
                in_code = false;
                prose.push(' ');
            }
            Event::Start(Tag::Link {
                link_type: LinkType::Autolink | LinkType::Email,
                ..
            }) => in_autolink = true,
            Event::End(TagEnd::Link) => in_autolink = false,
            Event::Text(t) if !in_code && !in_autolink => prose.push_str(&t),
            Event::Code(_) | Event::SoftBreak | Event::HardBreak => prose.push(' '),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::TableCell) => {
                prose.push(' ');
            }
            _ => {}
        }
    }
    prose
}

/// Detect and parse a leading `---` front matter block
#[must_use]
pub fn parse_front_matter(content: &str) -> FrontMatterState {
    let Some(first_end) = content.find('\n') else {
        return if content.trim_end() == "---" {
            FrontMatterState::Malformed("unterminated front matter".to_string())
        } else {
            FrontMatterState::Absent
        };
    };
    if content[..first_end].trim_end() != "---" {
        return FrontMatterState::Absent;
    }

    let raw_start = first_end + 1;
    let mut pos = raw_start;
    while pos < content.len() {
        let line_end = content[pos..].find('\n').map_or(content.len(), |i| pos + i);
        if content[pos..line_end].trim_end() == "---" {
            let block_end = (line_end + 1).min(content.len());
            return match parse_fields(&content[raw_start..pos]) {
                Ok(fields) => FrontMatterState::Present(FrontMatter {
                    span: 0..block_end,
                    raw_span: raw_start..pos,
                    fields,
                }),
                Err(reason) => FrontMatterState::Malformed(reason),
            };
        }
        pos = line_end + 1;
    }

    FrontMatterState::Malformed("unterminated front matter".to_string())
}

fn parse_fields(raw: &str) -> Result<serde_yaml::Mapping, String> {
    match serde_yaml::from_str::<serde_yaml::Value>(raw) {
        Ok(serde_yaml::Value::Mapping(fields)) => Ok(fields),
        Ok(serde_yaml::Value::Null) => Ok(serde_yaml::Mapping::new()),
        Ok(_) => Err("front matter must be a mapping".to_string()),
        Err(e) => Err(format!("invalid front matter yaml: {e}")),
    }
}
