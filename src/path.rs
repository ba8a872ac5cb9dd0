//! Path parsing and relative reference resolution.
//!
//! Paths are the sole addressing mechanism of the engine: dotted segments
//! access struct members, bracketed segments access array elements, and an
//! empty bracket (`[]`) means "append". Example: `order.lines[2].qty`.

use std::fmt;

/// One segment of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Struct member access (`.name`).
    Key(String),
    /// Array element access (`[3]`).
    Index(usize),
    /// Array append (`[]`), only meaningful as the final segment of a write.
    Append,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(k) => write!(f, "{}", k),
            Segment::Index(i) => write!(f, "[{}]", i),
            Segment::Append => write!(f, "[]"),
        }
    }
}

/// Parse a path string into segments.
///
/// Malformed bracket contents (non-numeric, unterminated) are treated as a
/// programmer error and panic: paths originate from schema authoring, not
/// from user input.
pub fn parse(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut chars = path.char_indices();
    let mut key_start: Option<usize> = None;

    while let Some((i, c)) = chars.next() {
        match c {
            '.' => {
                if let Some(start) = key_start.take() {
                    segments.push(Segment::Key(path[start..i].to_string()));
                }
            }
            '[' => {
                if let Some(start) = key_start.take() {
                    segments.push(Segment::Key(path[start..i].to_string()));
                }
                let bracket_start = i + 1;
                let mut end = None;
                for (j, cc) in chars.by_ref() {
                    if cc == ']' {
                        end = Some(j);
                        break;
                    }
                }
                let end = match end {
                    Some(e) => e,
                    None => panic!("unterminated bracket in path {:?}", path),
                };
                let inner = &path[bracket_start..end];
                if inner.is_empty() {
                    segments.push(Segment::Append);
                } else {
                    let index = inner
                        .parse::<usize>()
                        .unwrap_or_else(|_| panic!("invalid index {:?} in path {:?}", inner, path));
                    segments.push(Segment::Index(index));
                }
            }
            _ => {
                if key_start.is_none() {
                    key_start = Some(i);
                }
            }
        }
    }
    if let Some(start) = key_start {
        segments.push(Segment::Key(path[start..].to_string()));
    }
    segments
}

/// Print segments back into a path string.
pub fn to_string(segments: &[Segment]) -> String {
    let mut out = String::new();
    for seg in segments {
        match seg {
            Segment::Key(k) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(k);
            }
            Segment::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
            Segment::Append => out.push_str("[]"),
        }
    }
    out
}

/// Join a base path with a child key segment.
pub fn join_key(base: &str, key: &str) -> String {
    if base.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", base, key)
    }
}

/// Join a base path with an array index segment.
pub fn join_index(base: &str, index: usize) -> String {
    format!("{}[{}]", base, index)
}

/// Resolve a declared relative reference against a field's own path.
///
/// A leading run of N dots means "strip N trailing segments from the base,
/// then append the rest". A reference without a leading dot is already
/// absolute and is returned as-is.
///
/// ```
/// use formkit::resolve_relative;
///
/// assert_eq!(resolve_relative("order.end", ".start"), "order.start");
/// assert_eq!(resolve_relative("order.lines[0].qty", "...total"), "order.total");
/// assert_eq!(resolve_relative("order.end", "customer.id"), "customer.id");
/// ```
pub fn resolve_relative(base: &str, reference: &str) -> String {
    let dots = reference.chars().take_while(|c| *c == '.').count();
    if dots == 0 {
        return reference.to_string();
    }
    let rest = &reference[dots..];

    let mut segments = parse(base);
    for _ in 0..dots {
        segments.pop();
    }
    segments.extend(parse(rest));
    to_string(&segments)
}
