//! Input resolver: substitutes `{{ step_id.path }}` references with prior
//! step outputs.
//!
//! A string that is exactly one reference (after trimming) resolves to the
//! referenced value with its type preserved. Otherwise every reference in
//! the string is replaced by the referenced value rendered as text. A
//! reference that cannot be resolved is left in place verbatim.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde_json::Value;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A parsed `{{ step_id.seg.seg }}` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub step_id: String,
    /// Object keys, or decimal indices into arrays.
    pub path: Vec<String>,
}

impl Reference {
    /// Parse the text between the braces, e.g. `" a.path "`.
    pub fn parse(expr: &str) -> Option<Self> {
        let expr = expr.trim();
        if expr.is_empty() {
            return None;
        }
        let mut segments = Vec::new();
        for segment in expr.split('.') {
            if segment.is_empty() || !segment.chars().all(is_reference_char) {
                return None;
            }
            segments.push(segment.to_string());
        }
        let step_id = segments.remove(0);
        Some(Self {
            step_id,
            path: segments,
        })
    }

    /// Follow the path into the referenced step's output.
    pub fn lookup<'a>(&self, outputs: &'a HashMap<String, Value>) -> Option<&'a Value> {
        let mut current = outputs.get(&self.step_id)?;
        for segment in &self.path {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{{ {}", self.step_id)?;
        for segment in &self.path {
            write!(f, ".{segment}")?;
        }
        write!(f, " }}}}")
    }
}

fn is_reference_char(c: char) -> bool {
    !c.is_whitespace() && c != '{' && c != '}' && c != '.'
}

/// A piece of a scanned string.
#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Literal(&'a str),
    Reference { raw: &'a str, reference: Reference },
}

/// Split `text` into literal runs and references. Brace pairs whose content
/// is not a valid reference stay literal.
fn scan(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        let inner = &after_open[..end];
        let raw_end = start + OPEN.len() + end + CLOSE.len();
        match Reference::parse(inner) {
            Some(reference) => {
                if start > 0 {
                    segments.push(Segment::Literal(&rest[..start]));
                }
                segments.push(Segment::Reference {
                    raw: &rest[start..raw_end],
                    reference,
                });
                rest = &rest[raw_end..];
            }
            None => {
                // Keep the opening braces literal and rescan after them.
                segments.push(Segment::Literal(&rest[..start + OPEN.len()]));
                rest = after_open;
            }
        }
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    segments
}

/// The single reference `text` consists of, ignoring surrounding whitespace.
pub fn whole_reference(text: &str) -> Option<Reference> {
    match scan(text.trim()).as_slice() {
        [Segment::Reference { reference, .. }] => Some(reference.clone()),
        _ => None,
    }
}

/// All references appearing anywhere in `text`.
pub fn references_in(text: &str) -> Vec<Reference> {
    scan(text)
        .into_iter()
        .filter_map(|s| match s {
            Segment::Reference { reference, .. } => Some(reference),
            Segment::Literal(_) => None,
        })
        .collect()
}

/// Render a value for inline substitution.
fn coerce_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Resolve one string input.
pub fn resolve_str(text: &str, outputs: &HashMap<String, Value>) -> Value {
    if let Some(reference) = whole_reference(text) {
        return match reference.lookup(outputs) {
            Some(value) => value.clone(),
            None => Value::String(text.to_string()),
        };
    }

    let mut resolved = String::with_capacity(text.len());
    for segment in scan(text) {
        match segment {
            Segment::Literal(s) => resolved.push_str(s),
            Segment::Reference { raw, reference } => match reference.lookup(outputs) {
                Some(value) => resolved.push_str(&coerce_to_text(value)),
                None => resolved.push_str(raw),
            },
        }
    }
    Value::String(resolved)
}

/// Resolve every string nested anywhere in `inputs`.
pub fn resolve_inputs(inputs: &Value, outputs: &HashMap<String, Value>) -> Value {
    match inputs {
        Value::String(s) => resolve_str(s, outputs),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| resolve_inputs(item, outputs))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_inputs(v, outputs)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Ids of every step referenced anywhere in `inputs`.
pub fn referenced_steps(inputs: &Value) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    let mut stack = vec![inputs];
    while let Some(value) = stack.pop() {
        match value {
            Value::String(s) => ids.extend(references_in(s).into_iter().map(|r| r.step_id)),
            Value::Array(items) => stack.extend(items.iter()),
            Value::Object(map) => stack.extend(map.values()),
            _ => {}
        }
    }
    ids
}
