//! Typed search criteria.
//!
//! [`SearchQuery`] composes criteria values and renders them to the
//! protocol's textual search grammar through `Display`. The rendered
//! string is handed to the engine verbatim; [`SearchQuery::Raw`] lets a
//! caller supply grammar directly, as an opaque pass-through.

use std::fmt::{self, Write as _};

/// Search criteria, rendered to the IMAP search grammar.
///
/// Immutable once constructed. Criteria compose with
/// [`And`](Self::And)/[`Or`](Self::Or)/[`Not`](Self::Not):
///
/// ```
/// use postroom_imap::SearchQuery;
///
/// let query = SearchQuery::And(vec![
///     SearchQuery::Unseen,
///     SearchQuery::From("billing@example.com".into()),
/// ]);
/// assert_eq!(query.to_string(), "UNSEEN FROM billing@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SearchQuery {
    /// All messages.
    #[default]
    All,
    /// Messages with `\Answered`.
    Answered,
    /// Messages with `\Deleted`.
    Deleted,
    /// Messages with `\Draft`.
    Draft,
    /// Messages with `\Flagged`.
    Flagged,
    /// Recent messages not yet seen.
    New,
    /// Messages with `\Seen`.
    Seen,
    /// Messages without `\Seen`.
    Unseen,
    /// Messages without `\Deleted`.
    Undeleted,
    /// Subject contains text.
    Subject(String),
    /// From contains text.
    From(String),
    /// To contains text.
    To(String),
    /// Body contains text.
    Body(String),
    /// Text in header or body.
    Text(String),
    /// Header field contains value.
    Header(String, String),
    /// Messages since date (`DD-Mon-YYYY`).
    Since(String),
    /// Messages before date (`DD-Mon-YYYY`).
    Before(String),
    /// Messages on date (`DD-Mon-YYYY`).
    On(String),
    /// Larger than size in bytes.
    Larger(u32),
    /// Smaller than size in bytes.
    Smaller(u32),
    /// AND of criteria (the grammar's implicit conjunction).
    And(Vec<Self>),
    /// OR of two criteria.
    Or(Box<Self>, Box<Self>),
    /// NOT of a criterion.
    Not(Box<Self>),
    /// Caller-supplied grammar, passed through verbatim.
    Raw(String),
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("ALL"),
            Self::Answered => f.write_str("ANSWERED"),
            Self::Deleted => f.write_str("DELETED"),
            Self::Draft => f.write_str("DRAFT"),
            Self::Flagged => f.write_str("FLAGGED"),
            Self::New => f.write_str("NEW"),
            Self::Seen => f.write_str("SEEN"),
            Self::Unseen => f.write_str("UNSEEN"),
            Self::Undeleted => f.write_str("UNDELETED"),
            Self::Subject(s) => {
                f.write_str("SUBJECT ")?;
                fmt_astring(f, s)
            }
            Self::From(s) => {
                f.write_str("FROM ")?;
                fmt_astring(f, s)
            }
            Self::To(s) => {
                f.write_str("TO ")?;
                fmt_astring(f, s)
            }
            Self::Body(s) => {
                f.write_str("BODY ")?;
                fmt_astring(f, s)
            }
            Self::Text(s) => {
                f.write_str("TEXT ")?;
                fmt_astring(f, s)
            }
            Self::Header(name, value) => {
                f.write_str("HEADER ")?;
                fmt_astring(f, name)?;
                f.write_char(' ')?;
                fmt_astring(f, value)
            }
            Self::Since(date) => write!(f, "SINCE {date}"),
            Self::Before(date) => write!(f, "BEFORE {date}"),
            Self::On(date) => write!(f, "ON {date}"),
            Self::Larger(size) => write!(f, "LARGER {size}"),
            Self::Smaller(size) => write!(f, "SMALLER {size}"),
            Self::And(criteria) => {
                for (i, c) in criteria.iter().enumerate() {
                    if i > 0 {
                        f.write_char(' ')?;
                    }
                    write!(f, "{c}")?;
                }
                Ok(())
            }
            Self::Or(a, b) => write!(f, "OR {a} {b}"),
            Self::Not(c) => write!(f, "NOT {c}"),
            Self::Raw(s) => f.write_str(s),
        }
    }
}

/// Writes an astring: the atom form when possible, quoted otherwise.
fn fmt_astring(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        f.write_char('"')?;
        for c in s.chars() {
            if c == '"' || c == '\\' {
                f.write_char('\\')?;
            }
            f.write_char(c)?;
        }
        f.write_char('"')
    } else {
        f.write_str(s)
    }
}

/// Returns true if the byte forces quoted-string form.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*') || b < 0x20 || b == 0x7F
}
