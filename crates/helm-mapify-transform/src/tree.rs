//! YAML node tree with source positions, built from `yaml-rust` parser events.

use yaml_rust::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust::scanner::{Marker, ScanError, TScalarStyle};

use crate::quote::comment_start;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Scalar { value: String, block: bool },
    Sequence(Vec<Node>),
    Mapping(Vec<(Node, Node)>),
    Alias,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// 0-based line of the node's first token.
    pub line: usize,
    /// 0-based column (in chars) of the node's first token.
    pub col: usize,
}

impl Node {
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { value, block: false } => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn entries(&self) -> Option<&[(Node, Node)]> {
        match &self.kind {
            NodeKind::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Value of `key` in a mapping node.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entries()?
            .iter()
            .find(|(k, _)| k.as_scalar() == Some(key))
            .map(|(_, v)| v)
    }

    /// Whether the node is written in flow style (`[...]` or `{...}`).
    #[must_use]
    pub fn is_flow(&self, lines: &[&str]) -> bool {
        lines
            .get(self.line)
            .and_then(|line| line.chars().nth(self.col))
            .is_some_and(|c| c == '[' || c == '{')
    }
}

enum Frame {
    Sequence(Marker, Vec<Node>),
    Mapping(Marker, Vec<Node>),
}

/// Collection start events carry the scanner's lookahead position, not the
/// position of their first token, so collections are placed by their first
/// child and the source text around it.
struct TreeBuilder {
    lines: Vec<String>,
    stack: Vec<Frame>,
    documents: Vec<Node>,
}

fn position(mark: Marker) -> (usize, usize) {
    (mark.line().saturating_sub(1), mark.col())
}

fn at(kind: NodeKind, (line, col): (usize, usize)) -> Node {
    Node { kind, line, col }
}

impl TreeBuilder {
    fn new(src: &str) -> Self {
        Self {
            lines: src.lines().map(ToString::to_string).collect(),
            stack: Vec::new(),
            documents: Vec::new(),
        }
    }

    fn push(&mut self, node: Node) {
        match self.stack.last_mut() {
            Some(Frame::Sequence(_, items) | Frame::Mapping(_, items)) => items.push(node),
            None => self.documents.push(node),
        }
    }

    /// Last significant character before `(line, col)`, looking back over
    /// blank lines and comments.
    fn preceding(&self, line: usize, col: usize) -> Option<(usize, usize, char)> {
        let mut row = line;
        let mut limit = Some(col);
        loop {
            let text = self.lines.get(row)?.as_str();
            let chars: Vec<char> = match limit {
                Some(col) => text.chars().take(col).collect(),
                None => text[..comment_start(text).unwrap_or(text.len())]
                    .chars()
                    .collect(),
            };
            if let Some(pos) = chars.iter().rposition(|c| !c.is_whitespace()) {
                return Some((row, pos, chars[pos]));
            }
            row = row.checked_sub(1)?;
            limit = None;
        }
    }

    /// Opening bracket of an empty flow collection.
    fn flow_opener(&self, mark: Marker, open: char) -> (usize, usize) {
        let (line, col) = position(mark);
        let Some(chars) = self.lines.get(line).map(|l| l.chars().collect::<Vec<_>>()) else {
            return (line, col);
        };
        if chars.get(col) == Some(&open) {
            return (line, col);
        }
        chars[..col.min(chars.len())]
            .iter()
            .rposition(|c| *c == open)
            .or_else(|| chars.iter().skip(col).position(|c| *c == open).map(|p| p + col))
            .map_or((line, col), |c| (line, c))
    }

    /// The `-` of a block sequence or the `[` of a flow sequence.
    fn sequence_position(&self, items: &[Node], mark: Marker) -> (usize, usize) {
        let Some(first) = items.first() else {
            return self.flow_opener(mark, '[');
        };
        match self.preceding(first.line, first.col) {
            Some((line, col, '-' | '[')) => (line, col),
            _ => (first.line, first.col),
        }
    }

    /// The first key of a block mapping or the `{` of a flow mapping.
    fn mapping_position(&self, items: &[Node], mark: Marker) -> (usize, usize) {
        let Some(first) = items.first() else {
            return self.flow_opener(mark, '{');
        };
        match self.preceding(first.line, first.col) {
            Some((line, col, '{')) => (line, col),
            _ => (first.line, first.col),
        }
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        match ev {
            Event::Scalar(value, style, ..) => {
                let block = !matches!(
                    style,
                    TScalarStyle::Plain | TScalarStyle::SingleQuoted | TScalarStyle::DoubleQuoted
                );
                self.push(at(NodeKind::Scalar { value, block }, position(mark)));
            }
            Event::Alias(_) => self.push(at(NodeKind::Alias, position(mark))),
            Event::SequenceStart(..) => self.stack.push(Frame::Sequence(mark, Vec::new())),
            Event::MappingStart(..) => self.stack.push(Frame::Mapping(mark, Vec::new())),
            Event::SequenceEnd | Event::MappingEnd => {
                let node = match self.stack.pop() {
                    Some(Frame::Sequence(mark, items)) => {
                        let pos = self.sequence_position(&items, mark);
                        at(NodeKind::Sequence(items), pos)
                    }
                    Some(Frame::Mapping(mark, items)) => {
                        let pos = self.mapping_position(&items, mark);
                        let mut entries = Vec::with_capacity(items.len() / 2);
                        let mut items = items.into_iter();
                        while let (Some(k), Some(v)) = (items.next(), items.next()) {
                            entries.push((k, v));
                        }
                        at(NodeKind::Mapping(entries), pos)
                    }
                    None => return,
                };
                self.push(node);
            }
            _ => {}
        }
    }
}

/// Parse every document in `src`.
///
/// # Errors
///
/// Returns the scanner error for malformed YAML.
pub fn parse(src: &str) -> Result<Vec<Node>, ScanError> {
    let mut builder = TreeBuilder::new(src);
    let mut parser = Parser::new(src.chars());
    parser.load(&mut builder, true)?;
    Ok(builder.documents)
}
