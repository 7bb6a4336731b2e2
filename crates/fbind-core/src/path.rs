#![forbid(unsafe_code)]

//! Dotted member paths (`A.B[0].C`).
//!
//! A [`MemberPath`] is an immutable, cheaply clonable list of segment names.
//! Indexers become their own segments, bracket included, so
//! `Items[0].Name` parses to `["Items", "[0]", "Name"]` and the member
//! provider can tell an indexer apart from a named member.
//!
//! # Invariants
//!
//! 1. No segment is empty.
//! 2. Every indexer segment starts with `[`, ends with `]`, and is non-empty
//!    between the brackets.
//! 3. `path()` is canonical: parsing it again yields an equal path.
//!
//! # Failure Modes
//!
//! | Input | Error reason |
//! |-------|--------------|
//! | `A..B`, `.A`, `A.` | `empty segment` |
//! | `A[0`, `A]` | `unbalanced indexer` |
//! | `A[]` | `empty indexer` |
//! | `A[0]B` | `expected '.' or '[' after indexer` |
//! | `A["x]` | `unterminated string in indexer` |

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::error::{BindResult, BindingError};
use crate::value::Value;

/// Shape of a path, used to pick an observer strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// No segments: the path denotes the root itself.
    Empty,
    /// Exactly one segment.
    Single,
    /// Two or more segments.
    Multi,
}

#[derive(Clone)]
enum Members {
    Empty,
    Single(Rc<str>),
    Multi(Rc<[Rc<str>]>),
}

/// Parsed, immutable member path.
#[derive(Clone)]
pub struct MemberPath {
    path: Rc<str>,
    members: Members,
}

impl MemberPath {
    /// The empty path.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            path: Rc::from(""),
            members: Members::Empty,
        }
    }

    /// Parse a raw path string.
    ///
    /// Surrounding whitespace of the whole path and of each named segment is
    /// ignored.
    pub fn parse(raw: &str) -> BindResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::empty());
        }
        let segments = split_segments(trimmed)?;
        Ok(Self::from_segments(segments))
    }

    /// Build a path from already validated segments.
    ///
    /// Each entry is parsed as a path fragment, so `["A", "B[0]"]` yields
    /// the segments `A`, `B`, `[0]`.
    pub fn from_members<S: AsRef<str>>(members: &[S]) -> BindResult<Self> {
        let mut segments = Vec::with_capacity(members.len());
        for member in members {
            let member = member.as_ref().trim();
            if member.is_empty() {
                return Err(BindingError::format(member, "empty segment"));
            }
            segments.extend(split_segments(member)?);
        }
        Ok(Self::from_segments(segments))
    }

    fn from_segments(mut segments: Vec<Rc<str>>) -> Self {
        let path: Rc<str> = Rc::from(join_segments(&segments));
        let members = match segments.len() {
            0 => Members::Empty,
            1 => Members::Single(segments.pop().unwrap_or_else(|| Rc::from(""))),
            _ => Members::Multi(Rc::from(segments)),
        };
        Self { path, members }
    }

    /// Canonical path string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Segment names in walk order.
    #[must_use]
    pub fn members(&self) -> &[Rc<str>] {
        match &self.members {
            Members::Empty => &[],
            Members::Single(m) => std::slice::from_ref(m),
            Members::Multi(m) => m,
        }
    }

    /// Number of segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members().len()
    }

    /// Whether the path has no segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self.members, Members::Empty)
    }

    /// Whether the path has exactly one segment.
    #[must_use]
    pub fn is_single(&self) -> bool {
        matches!(self.members, Members::Single(_))
    }

    /// Shape of the path.
    #[must_use]
    pub fn kind(&self) -> PathKind {
        match self.members {
            Members::Empty => PathKind::Empty,
            Members::Single(_) => PathKind::Single,
            Members::Multi(_) => PathKind::Multi,
        }
    }

    /// Last segment, if any.
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.members().last().map(AsRef::as_ref)
    }
}

impl PartialEq for MemberPath {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for MemberPath {}

impl std::hash::Hash for MemberPath {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

impl fmt::Display for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)
    }
}

impl fmt::Debug for MemberPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberPath")
            .field("path", &self.path)
            .field("members", &self.members())
            .finish()
    }
}

impl std::str::FromStr for MemberPath {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn join_segments(segments: &[Rc<str>]) -> String {
    let mut out = String::new();
    for segment in segments {
        if !out.is_empty() && !is_indexer(segment) {
            out.push('.');
        }
        out.push_str(segment);
    }
    out
}

fn split_segments(raw: &str) -> BindResult<Vec<Rc<str>>> {
    let mut segments = Vec::new();
    let mut name = String::new();
    let mut chars = raw.char_indices().peekable();
    // Set after an indexer closes: the next char must be '.', '[' or end.
    let mut after_indexer = false;
    // Set after '.', so a trailing dot or '.[' is rejected.
    let mut expect_name = false;

    while let Some((start, c)) = chars.next() {
        match c {
            '.' => {
                if after_indexer {
                    after_indexer = false;
                    expect_name = true;
                    continue;
                }
                push_name(raw, &mut name, &mut segments)?;
                expect_name = true;
            }
            '[' => {
                if expect_name {
                    return Err(BindingError::format(raw, "empty segment"));
                }
                // After an indexer `name` only ever holds skipped whitespace.
                if !name.trim().is_empty() {
                    push_name(raw, &mut name, &mut segments)?;
                }
                name.clear();
                let mut quote: Option<char> = None;
                let mut end = None;
                for (idx, ch) in chars.by_ref() {
                    match (quote, ch) {
                        (Some(q), ch) if ch == q => quote = None,
                        (Some(_), _) => {}
                        (None, '"' | '\'') => quote = Some(ch),
                        (None, '[') => return Err(BindingError::format(raw, "unbalanced indexer")),
                        (None, ']') => {
                            end = Some(idx);
                            break;
                        }
                        (None, _) => {}
                    }
                }
                if quote.is_some() {
                    return Err(BindingError::format(raw, "unterminated string in indexer"));
                }
                let Some(end) = end else {
                    return Err(BindingError::format(raw, "unbalanced indexer"));
                };
                if raw[start + 1..end].trim().is_empty() {
                    return Err(BindingError::format(raw, "empty indexer"));
                }
                segments.push(Rc::from(&raw[start..=end]));
                after_indexer = true;
                expect_name = false;
            }
            ']' => return Err(BindingError::format(raw, "unbalanced indexer")),
            c => {
                if after_indexer {
                    if c.is_whitespace() {
                        continue;
                    }
                    return Err(BindingError::format(raw, "expected '.' or '[' after indexer"));
                }
                if !c.is_whitespace() {
                    expect_name = false;
                }
                name.push(c);
            }
        }
    }

    if after_indexer {
        return Ok(segments);
    }
    push_name(raw, &mut name, &mut segments)?;
    Ok(segments)
}

fn push_name(raw: &str, name: &mut String, segments: &mut Vec<Rc<str>>) -> BindResult<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(BindingError::format(raw, "empty segment"));
    }
    segments.push(Rc::from(trimmed));
    name.clear();
    Ok(())
}

/// Whether a segment is an indexer (`[...]`).
#[must_use]
pub fn is_indexer(segment: &str) -> bool {
    segment.starts_with('[') && segment.ends_with(']')
}

/// Parse the arguments of an indexer segment.
///
/// Integers become [`Value::Int`], quoted text becomes [`Value::Str`],
/// `true`/`false` become booleans, and anything else is kept as a string.
/// Returns `None` if `segment` is not an indexer.
#[must_use]
pub fn indexer_args(segment: &str) -> Option<Vec<Value>> {
    if !is_indexer(segment) {
        return None;
    }
    let inner = &segment[1..segment.len() - 1];
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut quoted = false;
    for ch in inner.chars() {
        match (quote, ch) {
            (Some(q), ch) if ch == q => quote = None,
            (Some(_), ch) => current.push(ch),
            (None, '"' | '\'') => {
                quote = Some(ch);
                quoted = true;
            }
            (None, ',') => {
                args.push(indexer_arg(&current, quoted));
                current.clear();
                quoted = false;
            }
            (None, ch) => current.push(ch),
        }
    }
    args.push(indexer_arg(&current, quoted));
    Some(args)
}

fn indexer_arg(raw: &str, quoted: bool) -> Value {
    if quoted {
        return Value::from(raw);
    }
    let raw = raw.trim();
    if let Ok(i) = raw.parse::<i64>() {
        return Value::Int(i);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::from(raw),
    }
}

/// Interning cache for parsed paths.
///
/// Many observers share the same path text; the cache hands out clones of
/// one parsed instance. Failed parses are not cached.
#[derive(Default)]
pub struct MemberPathCache {
    paths: RefCell<AHashMap<Box<str>, MemberPath>>,
}

impl MemberPathCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `raw`, returning the cached instance when present.
    pub fn get_or_parse(&self, raw: &str) -> BindResult<MemberPath> {
        if let Some(path) = self.paths.borrow().get(raw) {
            return Ok(path.clone());
        }
        let path = MemberPath::parse(raw)?;
        self.paths
            .borrow_mut()
            .insert(Box::from(raw), path.clone());
        Ok(path)
    }

    /// Number of cached paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.borrow().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.borrow().is_empty()
    }

    /// Drop every cached path.
    pub fn clear(&self) {
        self.paths.borrow_mut().clear();
    }
}

impl fmt::Debug for MemberPathCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberPathCache")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segs(raw: &str) -> Vec<String> {
        MemberPath::parse(raw)
            .unwrap()
            .members()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn empty_path() {
        let path = MemberPath::parse("  ").unwrap();
        assert!(path.is_empty());
        assert_eq!(path.kind(), PathKind::Empty);
        assert_eq!(path.len(), 0);
        assert_eq!(path.last(), None);
    }

    #[test]
    fn single_segment() {
        let path = MemberPath::parse("Name").unwrap();
        assert!(path.is_single());
        assert_eq!(path.kind(), PathKind::Single);
        assert_eq!(path.members().len(), 1);
        assert_eq!(path.last(), Some("Name"));
    }

    #[test]
    fn multi_segment() {
        assert_eq!(segs("A.B.C"), ["A", "B", "C"]);
        assert_eq!(MemberPath::parse("A.B").unwrap().kind(), PathKind::Multi);
    }

    #[test]
    fn whitespace_is_trimmed() {
        assert_eq!(segs(" A . B "), ["A", "B"]);
        assert_eq!(MemberPath::parse(" A . B ").unwrap().path(), "A.B");
    }

    #[test]
    fn indexers_become_segments() {
        assert_eq!(segs("Items[0].Name"), ["Items", "[0]", "Name"]);
        assert_eq!(segs("Grid[1][2]"), ["Grid", "[1]", "[2]"]);
        assert_eq!(segs("[0]"), ["[0]"]);
        assert_eq!(segs("Map[\"a.b\"].X"), ["Map", "[\"a.b\"]", "X"]);
        assert_eq!(MemberPath::parse("Items[0].Name").unwrap().path(), "Items[0].Name");
    }

    #[test]
    fn malformed_paths_fail() {
        for (raw, reason) in [
            ("A..B", "empty segment"),
            (".A", "empty segment"),
            ("A.", "empty segment"),
            ("A.[0]", "empty segment"),
            ("A[0", "unbalanced indexer"),
            ("A]", "unbalanced indexer"),
            ("A[[0]]", "unbalanced indexer"),
            ("A[]", "empty indexer"),
            ("A[0]B", "expected '.' or '[' after indexer"),
            ("A[\"x]", "unterminated string in indexer"),
        ] {
            match MemberPath::parse(raw) {
                Err(BindingError::Format { reason: r, .. }) => assert_eq!(r, reason, "{raw}"),
                other => panic!("{raw}: expected format error, got {other:?}"),
            }
        }
    }

    #[test]
    fn same_text_paths_are_equal() {
        let a = MemberPath::parse("A.B").unwrap();
        let b = MemberPath::parse("A . B").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn from_members_splits_fragments() {
        let path = MemberPath::from_members(&["Owner", "Items[1]"]).unwrap();
        assert_eq!(path.path(), "Owner.Items[1]");
        assert_eq!(path.len(), 3);
        assert!(MemberPath::from_members(&["A", " "]).is_err());
    }

    #[test]
    fn indexer_arguments() {
        assert_eq!(indexer_args("[0]"), Some(vec![Value::Int(0)]));
        assert_eq!(
            indexer_args("['k', 2, true]"),
            Some(vec![Value::from("k"), Value::Int(2), Value::Bool(true)])
        );
        assert_eq!(indexer_args("[\"12\"]"), Some(vec![Value::from("12")]));
        assert_eq!(indexer_args("Name"), None);
    }

    #[test]
    fn cache_interns_paths() {
        let cache = MemberPathCache::new();
        let a = cache.get_or_parse("A.B").unwrap();
        let b = cache.get_or_parse("A.B").unwrap();
        assert_eq!(a, b);
        assert_eq!(cache.len(), 1);
        assert!(cache.get_or_parse("A..B").is_err());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_name() -> impl Strategy<Value = String> {
            "[A-Za-z_][A-Za-z0-9_]{0,8}"
        }

        fn arb_segment() -> impl Strategy<Value = String> {
            prop_oneof![
                3 => arb_name(),
                1 => (0u16..100).prop_map(|i| format!("[{i}]")),
            ]
        }

        proptest! {
            #[test]
            fn canonical_path_reparses_equal(
                head in arb_name(),
                rest in proptest::collection::vec(arb_segment(), 0..6),
            ) {
                let mut raw = head;
                for seg in &rest {
                    if !seg.starts_with('[') {
                        raw.push('.');
                    }
                    raw.push_str(seg);
                }
                let path = MemberPath::parse(&raw).unwrap();
                prop_assert_eq!(path.len(), rest.len() + 1);
                let again = MemberPath::parse(path.path()).unwrap();
                prop_assert_eq!(&again, &path);
                prop_assert_eq!(again.members(), path.members());
            }

            #[test]
            fn parse_never_panics(raw in ".{0,32}") {
                let _ = MemberPath::parse(&raw);
            }

            #[test]
            fn segments_are_never_empty(raw in "[A-Za-z.\\[\\]0-9]{0,24}") {
                if let Ok(path) = MemberPath::parse(&raw) {
                    for seg in path.members() {
                        prop_assert!(!seg.is_empty());
                    }
                }
            }
        }
    }
}
