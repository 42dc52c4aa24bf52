//! Accessor paths over JSON values.
//!
//! A path such as `settings.theme` or `user.tags[0]` or `map["a.b"]` names a
//! location inside a scope. Paths can be read and assigned; assignment
//! creates missing intermediate objects and pads arrays with `null`.

use crate::error::PathError;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Largest array index [`Path::assign`] will pad an array out to.
pub const MAX_ASSIGN_INDEX: usize = 1 << 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => write!(f, "{key}"),
            Segment::Index(index) => write!(f, "[{index}]"),
        }
    }
}

/// A parsed accessor path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    pub fn parse(expr: &str) -> Result<Self, PathError> {
        Parser::new(expr).parse()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Resolve the path against `root`.
    pub fn read<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key),
                (Segment::Index(index), Value::Array(items)) => items.get(*index),
                _ => None,
            })
    }

    /// Write `value` at the path, creating intermediate containers.
    pub fn assign(&self, root: &mut Value, value: Value) -> Result<(), PathError> {
        let mut current = root;
        for (i, segment) in self.segments.iter().enumerate() {
            let next_is_index = matches!(self.segments.get(i + 1), Some(Segment::Index(_)));
            if current.is_null() {
                *current = Value::Object(Map::new());
            }
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => {
                    map.entry(key.clone()).or_insert_with(|| empty_for(next_is_index))
                }
                (Segment::Index(index), Value::Array(items)) => {
                    let index = *index;
                    if items.len() <= index {
                        let len = index
                            .checked_add(1)
                            .filter(|_| index <= MAX_ASSIGN_INDEX)
                            .ok_or(PathError::IndexTooLarge { index })?;
                        items.resize(len, Value::Null);
                    }
                    &mut items[index]
                }
                _ => {
                    return Err(PathError::NotAContainer {
                        segment: self.prefix_display(i),
                    })
                }
            };
        }
        *current = value;
        Ok(())
    }

    fn prefix_display(&self, len: usize) -> String {
        if len == 0 {
            return "<root>".to_string();
        }
        Path {
            segments: self.segments[..len].to_vec(),
        }
        .to_string()
    }
}

// Placeholder for a missing intermediate: `null` when the next segment is a
// key (upgraded to an object on the next step), an array when it is an index.
fn empty_for(next_is_index: bool) -> Value {
    if next_is_index {
        Value::Array(Vec::new())
    } else {
        Value::Null
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Key(key) if i > 0 => write!(f, ".{key}")?,
                other => write!(f, "{other}")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

struct Parser<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    segments: Vec<Segment>,
}

impl<'a> Parser<'a> {
    fn new(expr: &'a str) -> Self {
        Self {
            chars: expr.char_indices().peekable(),
            segments: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Path, PathError> {
        if self.chars.peek().is_none() {
            return Err(PathError::Empty);
        }
        self.identifier()?;
        while let Some(&(pos, ch)) = self.chars.peek() {
            match ch {
                '.' => {
                    self.chars.next();
                    self.identifier()?;
                }
                '[' => {
                    self.chars.next();
                    self.index()?;
                }
                _ => return Err(PathError::UnexpectedChar { pos, ch }),
            }
        }
        Ok(Path {
            segments: self.segments,
        })
    }

    fn identifier(&mut self) -> Result<(), PathError> {
        let mut name = String::new();
        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '$' {
                name.push(ch);
                self.chars.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            return Err(match self.chars.peek() {
                Some(&(pos, ch)) => PathError::UnexpectedChar { pos, ch },
                None => PathError::Empty,
            });
        }
        self.segments.push(Segment::Key(name));
        Ok(())
    }

    fn index(&mut self) -> Result<(), PathError> {
        let segment = match self.chars.peek() {
            Some(&(_, quote @ ('"' | '\''))) => {
                self.chars.next();
                let mut key = String::new();
                loop {
                    match self.chars.next() {
                        Some((_, ch)) if ch == quote => break,
                        Some((_, ch)) => key.push(ch),
                        None => return Err(PathError::UnterminatedIndex),
                    }
                }
                Segment::Key(key)
            }
            Some(_) => {
                let mut digits = String::new();
                while let Some(&(pos, ch)) = self.chars.peek() {
                    if ch.is_ascii_digit() {
                        digits.push(ch);
                        self.chars.next();
                    } else if ch == ']' {
                        break;
                    } else {
                        return Err(PathError::UnexpectedChar { pos, ch });
                    }
                }
                match digits.parse() {
                    Ok(index) => Segment::Index(index),
                    Err(_) => return Err(PathError::UnterminatedIndex),
                }
            }
            None => return Err(PathError::UnterminatedIndex),
        };
        match self.chars.next() {
            Some((_, ']')) => {
                self.segments.push(segment);
                Ok(())
            }
            Some((pos, ch)) => Err(PathError::UnexpectedChar { pos, ch }),
            None => Err(PathError::UnterminatedIndex),
        }
    }
}
