//! `{source}` templates for hostnames and service check messages

use crate::error::TransformError;
use querymeter_core::Sources;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Source(String),
}

/// A string with `{name}` placeholders filled from row sources.
/// `{{` and `}}` produce literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(text: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        name.push(c);
                    }
                    if closed {
                        if !literal.is_empty() {
                            segments.push(Segment::Text(std::mem::take(&mut literal)));
                        }
                        segments.push(Segment::Source(name.trim().to_string()));
                    } else {
                        // unterminated placeholder stays text
                        literal.push('{');
                        literal.push_str(&name);
                    }
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Text(literal));
        }

        Self { segments }
    }

    /// Source names referenced by the template, in order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Source(name) => Some(name.as_str()),
            Segment::Text(_) => None,
        })
    }

    pub fn is_static(&self) -> bool {
        self.references().next().is_none()
    }

    pub fn render(&self, sources: &Sources) -> Result<String, TransformError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Source(name) => {
                    let value = sources
                        .get(name)
                        .ok_or_else(|| TransformError::MissingSource(name.clone()))?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }
}
