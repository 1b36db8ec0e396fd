//! Compact element selector parser.
//!
//! Parses a small CSS subset into [`ElementSelector`] values:
//!
//! - `tr`: tag name (`*` or omitted matches any tag)
//! - `.zA`: class token (repeatable)
//! - `[data-thread-id]`: attribute present
//! - `[gh="tl"]`: attribute equals
//! - `[class*="zA"]`: attribute contains
//!
//! Combinators, pseudo-classes and selector lists are not supported; an ordered
//! list of selectors in config plays the role of a selector list.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for selector parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid selector '{input}': {reason}")]
pub struct SelectorError {
    /// The selector text that failed to parse.
    pub input: String,
    /// Human-readable description of the problem.
    pub reason: String,
}

impl SelectorError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Anything a selector can be tested against.
///
/// Classes are read from the `class` attribute, so implementors only need tag and
/// attribute access.
pub trait SelectorTarget {
    /// Lower-case tag name of the element.
    fn tag_name(&self) -> &str;
    /// Value of the named attribute, if present.
    fn attribute(&self, name: &str) -> Option<&str>;
}

/// How an attribute condition compares the attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeOp {
    /// `[name]`
    Present,
    /// `[name="value"]`
    Equals(String),
    /// `[name*="value"]`
    Contains(String),
}

/// One `[...]` condition of a selector.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeCondition {
    pub name: String,
    pub op: AttributeOp,
}

impl AttributeCondition {
    fn matches(&self, value: Option<&str>) -> bool {
        match (&self.op, value) {
            (_, None) => false,
            (AttributeOp::Present, Some(_)) => true,
            (AttributeOp::Equals(expected), Some(v)) => v == expected,
            (AttributeOp::Contains(fragment), Some(v)) => v.contains(fragment.as_str()),
        }
    }
}

/// A parsed compound selector (tag + classes + attribute conditions).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ElementSelector {
    /// Required tag name, lower-case. `None` matches any tag.
    pub tag: Option<String>,
    /// Class tokens that must all be present.
    pub classes: Vec<String>,
    /// Attribute conditions that must all hold.
    pub attributes: Vec<AttributeCondition>,
}

impl ElementSelector {
    /// Parse a selector string. See the module docs for the supported syntax.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::new(input, "empty selector"));
        }

        let chars: Vec<char> = trimmed.chars().collect();
        let mut pos = 0;
        let mut selector = ElementSelector::default();

        // Leading tag name or universal selector
        if chars[pos] == '*' {
            pos += 1;
        } else if is_ident_char(chars[pos]) {
            let tag = read_ident(&chars, &mut pos);
            selector.tag = Some(tag.to_ascii_lowercase());
        }

        while pos < chars.len() {
            match chars[pos] {
                '.' => {
                    pos += 1;
                    let class = read_ident(&chars, &mut pos);
                    if class.is_empty() {
                        return Err(SelectorError::new(input, "expected class name after '.'"));
                    }
                    selector.classes.push(class);
                }
                '[' => {
                    pos += 1;
                    let condition = read_attribute(&chars, &mut pos)
                        .map_err(|reason| SelectorError::new(input, reason))?;
                    selector.attributes.push(condition);
                }
                c => {
                    return Err(SelectorError::new(
                        input,
                        format!("unexpected character '{}' at offset {}", c, pos),
                    ));
                }
            }
        }

        Ok(selector)
    }

    /// Test the selector against an element.
    pub fn matches<T: SelectorTarget + ?Sized>(&self, target: &T) -> bool {
        if let Some(tag) = &self.tag
            && !target.tag_name().eq_ignore_ascii_case(tag)
        {
            return false;
        }

        if !self.classes.is_empty() {
            let class_attr = target.attribute("class").unwrap_or("");
            let has_all = self
                .classes
                .iter()
                .all(|wanted| class_attr.split_whitespace().any(|c| c == wanted));
            if !has_all {
                return false;
            }
        }

        self.attributes
            .iter()
            .all(|cond| cond.matches(target.attribute(&cond.name)))
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn read_attribute(chars: &[char], pos: &mut usize) -> Result<AttributeCondition, String> {
    let name = read_ident(chars, pos);
    if name.is_empty() {
        return Err("expected attribute name after '['".to_string());
    }

    let op_kind = match chars.get(*pos) {
        Some(']') => {
            *pos += 1;
            return Ok(AttributeCondition {
                name,
                op: AttributeOp::Present,
            });
        }
        Some('=') => {
            *pos += 1;
            '='
        }
        Some('*') if chars.get(*pos + 1) == Some(&'=') => {
            *pos += 2;
            '*'
        }
        Some(c) => return Err(format!("unexpected '{}' in attribute condition", c)),
        None => return Err("unterminated attribute condition".to_string()),
    };

    let value = match chars.get(*pos) {
        Some(&quote) if quote == '"' || quote == '\'' => {
            *pos += 1;
            let start = *pos;
            while *pos < chars.len() && chars[*pos] != quote {
                *pos += 1;
            }
            if *pos >= chars.len() {
                return Err("unterminated quoted value".to_string());
            }
            let value: String = chars[start..*pos].iter().collect();
            *pos += 1;
            value
        }
        _ => read_ident(chars, pos),
    };

    if chars.get(*pos) != Some(&']') {
        return Err("expected ']' to close attribute condition".to_string());
    }
    *pos += 1;

    let op = if op_kind == '*' {
        AttributeOp::Contains(value)
    } else {
        AttributeOp::Equals(value)
    };
    Ok(AttributeCondition { name, op })
}

impl fmt::Display for ElementSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}", tag)?,
            None if self.classes.is_empty() && self.attributes.is_empty() => write!(f, "*")?,
            None => {}
        }
        for class in &self.classes {
            write!(f, ".{}", class)?;
        }
        for cond in &self.attributes {
            match &cond.op {
                AttributeOp::Present => write!(f, "[{}]", cond.name)?,
                AttributeOp::Equals(v) => write!(f, "[{}=\"{}\"]", cond.name, v)?,
                AttributeOp::Contains(v) => write!(f, "[{}*=\"{}\"]", cond.name, v)?,
            }
        }
        Ok(())
    }
}

impl FromStr for ElementSelector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ElementSelector {
    type Error = SelectorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ElementSelector> for String {
    fn from(value: ElementSelector) -> Self {
        value.to_string()
    }
}

/// Parse a selector known to be valid at compile time (used by defaults).
pub(crate) fn builtin(input: &str) -> ElementSelector {
    ElementSelector::parse(input)
        .unwrap_or_else(|e| panic!("built-in selector must parse: {}", e))
}
