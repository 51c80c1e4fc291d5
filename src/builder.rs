//! Tree Builder
//!
//! Parses raw document bytes into a fully materialized [`ConfigTree`].
//! The builder is a pure function of its input and its [`IdentityMarker`]:
//! no I/O, no shared state, so separate documents may be built from
//! separate threads freely.

use std::collections::BTreeSet;

use memchr::{memchr, memmem};
use serde::{Deserialize, Serialize};

use crate::encoding;
use crate::error::{ParseError, ParseResult, TextPosition};
use crate::scanner::{Scanner, decode_entities};
use crate::tree::{ConfigTree, NodeId, TreeArena};

/// Default identity-marker suffix (AUTOSAR `SHORT-NAME`)
pub const DEFAULT_IDENTITY_SUFFIX: &str = "SHORT-NAME";

/// Which child elements name their parent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMarker {
    /// Any child whose tag ends with this suffix (`ar:SHORT-NAME` matches `SHORT-NAME`)
    Suffix(String),
    /// Children whose tag is exactly one of these
    Tags(BTreeSet<String>),
    /// Nothing names its parent; siblings are told apart by index only
    Disabled,
}

impl Default for IdentityMarker {
    fn default() -> Self {
        IdentityMarker::Suffix(DEFAULT_IDENTITY_SUFFIX.to_string())
    }
}

impl IdentityMarker {
    pub fn matches(&self, tag: &str) -> bool {
        match self {
            IdentityMarker::Suffix(suffix) => !suffix.is_empty() && tag.ends_with(suffix.as_str()),
            IdentityMarker::Tags(tags) => tags.contains(tag),
            IdentityMarker::Disabled => false,
        }
    }
}

/// Builds configuration trees with a fixed identity-marker rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeBuilder {
    identity: IdentityMarker,
}

impl TreeBuilder {
    pub fn new(identity: IdentityMarker) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &IdentityMarker {
        &self.identity
    }

    /// Parse `bytes` into a tree.
    ///
    /// Fails with [`ParseError::Empty`] for empty or whitespace-only input,
    /// [`ParseError::Encoding`] for input that is not UTF-8/UTF-16 (or
    /// declares another encoding), and [`ParseError::Syntax`] for markup
    /// that is not well-formed. Partial trees are never returned.
    pub fn build(&self, bytes: &[u8]) -> ParseResult<ConfigTree> {
        let text = encoding::decode(bytes)?;
        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let tree = Parser::new(&text, &self.identity).run()?;
        tracing::debug!(nodes = tree.len(), root = tree.root().tag(), "built configuration tree");
        Ok(tree)
    }
}

/// Build a tree with the default identity marker
pub fn build(bytes: &[u8]) -> ParseResult<ConfigTree> {
    TreeBuilder::default().build(bytes)
}

struct OpenElement {
    id: NodeId,
    text: String,
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    identity: &'a IdentityMarker,
    arena: TreeArena,
    stack: Vec<OpenElement>,
    root_closed: bool,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str, identity: &'a IdentityMarker) -> Self {
        Self {
            scanner: Scanner::new(text),
            identity,
            arena: TreeArena::default(),
            stack: Vec::new(),
            root_closed: false,
        }
    }

    fn error(&self, offset: usize, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            position: TextPosition::locate(self.scanner.input(), offset),
            message: message.into(),
        }
    }

    fn run(mut self) -> ParseResult<ConfigTree> {
        while !self.scanner.is_eof() {
            if self.scanner.peek() == Some(b'<') {
                self.markup()?;
            } else {
                let start = self.scanner.position();
                let raw = self.scanner.take_text();
                if self.stack.is_empty() {
                    if raw.trim().is_empty() {
                        continue;
                    }
                    return Err(self.error(start, "text outside the root element"));
                }
                if let Some(offset) = memmem::find(raw.as_bytes(), b"]]>") {
                    return Err(self.error(start + offset, "']]>' is not allowed in character data"));
                }
                let text = decode_entities(raw)
                    .map_err(|err| self.error(start + err.offset, err.message))?;
                if let Some(open) = self.stack.last_mut() {
                    open.text.push_str(&text);
                }
            }
        }

        if let Some(open) = self.stack.last() {
            let tag = self.arena.get(open.id).tag().to_string();
            return Err(self.error(
                self.scanner.position(),
                format!("unclosed element <{}>", tag),
            ));
        }
        if self.arena.is_empty() {
            return Err(self.error(self.scanner.position(), "no root element"));
        }

        Ok(self.arena.finish())
    }

    fn markup(&mut self) -> ParseResult<()> {
        let start = self.scanner.position();

        if self.scanner.starts_with("<?") {
            self.scanner.advance(2);
            self.scanner
                .take_until("?>")
                .ok_or_else(|| self.error(start, "unterminated processing instruction"))?;
        } else if self.scanner.starts_with("<!--") {
            self.scanner.advance(4);
            self.scanner
                .take_until("-->")
                .ok_or_else(|| self.error(start, "unterminated comment"))?;
        } else if self.scanner.starts_with("<![CDATA[") {
            if self.stack.is_empty() {
                return Err(self.error(start, "CDATA section outside the root element"));
            }
            self.scanner.advance(9);
            let data = self
                .scanner
                .take_until("]]>")
                .ok_or_else(|| self.error(start, "unterminated CDATA section"))?;
            if let Some(open) = self.stack.last_mut() {
                open.text.push_str(data);
            }
        } else if self.scanner.starts_with("<!DOCTYPE") {
            if !self.arena.is_empty() {
                return Err(self.error(start, "DOCTYPE after the root element"));
            }
            self.scanner.advance(9);
            if !self.scanner.skip_doctype() {
                return Err(self.error(start, "unterminated DOCTYPE"));
            }
        } else if self.scanner.starts_with("<!") {
            return Err(self.error(start, "unsupported markup declaration"));
        } else if self.scanner.starts_with("</") {
            self.end_tag(start)?;
        } else {
            self.start_tag(start)?;
        }

        Ok(())
    }

    fn start_tag(&mut self, start: usize) -> ParseResult<()> {
        self.scanner.advance(1);
        let tag = self
            .scanner
            .read_name()
            .ok_or_else(|| self.error(start, "invalid element name"))?;

        if self.root_closed {
            return Err(self.error(
                start,
                format!("element <{}> after the root element", tag),
            ));
        }

        let parent = self.stack.last().map(|open| open.id);
        let id = self.arena.push(tag.to_string(), parent);

        let mut after_attribute = false;
        loop {
            let before = self.scanner.position();
            self.scanner.skip_whitespace();
            let at = self.scanner.position();

            if self.scanner.starts_with("/>") {
                self.scanner.advance(2);
                self.close(id, String::new());
                return Ok(());
            }
            if self.scanner.peek() == Some(b'>') {
                self.scanner.advance(1);
                self.stack.push(OpenElement {
                    id,
                    text: String::new(),
                });
                return Ok(());
            }
            if self.scanner.is_eof() {
                return Err(self.error(start, format!("unterminated start tag <{}>", tag)));
            }
            if after_attribute && at == before {
                return Err(self.error(
                    at,
                    format!("missing whitespace between attributes in <{}>", tag),
                ));
            }

            let name = self
                .scanner
                .read_name()
                .ok_or_else(|| self.error(at, format!("malformed attribute in <{}>", tag)))?;
            self.scanner.skip_whitespace();
            if self.scanner.peek() != Some(b'=') {
                return Err(self.error(
                    self.scanner.position(),
                    format!("attribute '{}' has no value", name),
                ));
            }
            self.scanner.advance(1);
            self.scanner.skip_whitespace();
            let value_at = self.scanner.position();
            let value = self.scanner.read_quoted().ok_or_else(|| {
                self.error(value_at, format!("value of attribute '{}' must be quoted", name))
            })?;

            if let Some(offset) = memchr(b'<', value.as_bytes()) {
                return Err(self.error(
                    value_at + 1 + offset,
                    format!("'<' is not allowed in the value of attribute '{}'", name),
                ));
            }
            let value = decode_entities(value)
                .map_err(|err| self.error(value_at + 1 + err.offset, err.message))?
                .into_owned();
            if self
                .arena
                .get_mut(id)
                .attributes
                .insert(name.to_string(), value)
                .is_some()
            {
                return Err(self.error(at, format!("duplicate attribute '{}'", name)));
            }
            after_attribute = true;
        }
    }

    fn end_tag(&mut self, start: usize) -> ParseResult<()> {
        self.scanner.advance(2);
        let tag = self
            .scanner
            .read_name()
            .ok_or_else(|| self.error(start, "invalid end tag"))?;
        self.scanner.skip_whitespace();
        if self.scanner.peek() != Some(b'>') {
            return Err(self.error(start, format!("unterminated end tag </{}>", tag)));
        }
        self.scanner.advance(1);

        let Some(open) = self.stack.pop() else {
            return Err(self.error(start, format!("unexpected end tag </{}>", tag)));
        };
        let expected = self.arena.get(open.id).tag();
        if expected != tag {
            return Err(self.error(
                start,
                format!("mismatched end tag: expected </{}>, found </{}>", expected, tag),
            ));
        }

        self.close(open.id, open.text);
        Ok(())
    }

    /// Finish an element: settle its text and, for identity children,
    /// hand the text to the parent as its name.
    fn close(&mut self, id: NodeId, text: String) {
        let trimmed = text.trim();
        let text = (!trimmed.is_empty()).then(|| trimmed.to_string());

        let element = self.arena.get_mut(id);
        element.text = text.clone();
        let parent = element.parent;
        let is_identity = self.identity.matches(&element.tag);

        if let (true, Some(parent), Some(name)) = (is_identity, parent, text) {
            let parent = self.arena.get_mut(parent);
            if parent.name.is_none() {
                parent.name = Some(name);
            }
        }

        if self.stack.is_empty() {
            self.root_closed = true;
        }
    }
}
