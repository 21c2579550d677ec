//! Song filtering.
//!
//! Filters never mutate their input: each one walks a [`SongList`] and
//! produces a new list sharing the same song handles.
//!
//! Attribute predicates come in two forms: a typed closure, or a textual
//! expression in a small closed grammar (`attribute <op> <literal>`). The
//! textual form exists for interactive use against attribute names discovered
//! via [`get_attributes`](crate::attributes::get_attributes); it is parsed
//! and evaluated by this module and is deliberately not a general expression
//! language.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use chrono::{Local, NaiveDate};
use regex::Regex;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{Error, FilterError, Result};
use crate::library::{ATTR_ACQUIRED, SongList};

/// Format of the acquisition-date attribute (month/day/year).
pub const ACQUIRED_DATE_FORMAT: &str = "%m/%d/%Y";

static COMPARE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^attribute\s*(==|!=|<=|>=|<|>)\s*(.+)$").expect("valid regex"));

static WORD_OP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^attribute\s+(contains|startswith|endswith)\s+(.+)$").expect("valid regex")
});

// =============================================================================
// Attribute tests
// =============================================================================

/// Comparison operators of the expression grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    StartsWith,
    EndsWith,
}

impl CompareOp {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "==" => Some(Self::Eq),
            "!=" => Some(Self::Ne),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Ge),
            "contains" => Some(Self::Contains),
            "startswith" => Some(Self::StartsWith),
            "endswith" => Some(Self::EndsWith),
            _ => None,
        }
    }
}

/// A parsed filter expression: one comparison of the attribute value against
/// one literal.
///
/// Ordering operators compare numerically and require both sides to be
/// numeric; equality falls back to string comparison when either side is not
/// a number. Quoting the literal forces string semantics.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    raw: String,
    op: CompareOp,
    literal_text: String,
    literal_number: Option<f64>,
}

impl FilterExpr {
    /// Parse an expression of the form `attribute <op> <literal>`.
    ///
    /// The literal token `attribute` stands for the attribute value of each
    /// song under test. Supported operators: `== != < <= > >= contains
    /// startswith endswith`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidExpression`] when the text does not
    /// match the grammar.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let captures = COMPARE_RE
            .captures(trimmed)
            .or_else(|| WORD_OP_RE.captures(trimmed))
            .ok_or_else(|| {
                Error::Filter(FilterError::InvalidExpression {
                    expression: text.to_string(),
                    reason: "expected `attribute <op> <literal>`".to_string(),
                })
            })?;

        let op = CompareOp::parse(&captures[1]).ok_or_else(|| {
            Error::Filter(FilterError::InvalidExpression {
                expression: text.to_string(),
                reason: format!("unknown operator {:?}", &captures[1]),
            })
        })?;

        let literal = captures[2].trim();
        let (literal_text, quoted) = unquote(literal);
        if literal_text.is_empty() && !quoted {
            return Err(Error::Filter(FilterError::InvalidExpression {
                expression: text.to_string(),
                reason: "missing literal".to_string(),
            }));
        }
        let literal_number = if quoted {
            None
        } else {
            literal_text.parse::<f64>().ok()
        };

        Ok(Self {
            raw: trimmed.to_string(),
            op,
            literal_text,
            literal_number,
        })
    }

    /// The original expression text.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Evaluate the expression against one attribute value.
    fn evaluate(&self, value: &str) -> std::result::Result<bool, String> {
        match self.op {
            CompareOp::Eq | CompareOp::Ne => {
                let equal = match self.literal_number {
                    Some(expected) => value
                        .parse::<f64>()
                        .map_or(value == self.literal_text, |actual| actual == expected),
                    None => value == self.literal_text,
                };
                Ok((self.op == CompareOp::Ne) != equal)
            }
            CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
                let Some(expected) = self.literal_number else {
                    return Err(format!(
                        "ordering comparison against non-numeric literal {:?}",
                        self.literal_text
                    ));
                };
                let actual: f64 = value
                    .parse()
                    .map_err(|_| format!("attribute value {value:?} is not numeric"))?;
                Ok(match self.op {
                    CompareOp::Lt => actual < expected,
                    CompareOp::Le => actual <= expected,
                    CompareOp::Gt => actual > expected,
                    _ => actual >= expected,
                })
            }
            CompareOp::Contains => Ok(value.contains(&self.literal_text)),
            CompareOp::StartsWith => Ok(value.starts_with(&self.literal_text)),
            CompareOp::EndsWith => Ok(value.ends_with(&self.literal_text)),
        }
    }
}

fn unquote(literal: &str) -> (String, bool) {
    let bytes = literal.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            return (literal[1..literal.len() - 1].to_string(), true);
        }
    }
    (literal.to_string(), false)
}

/// A test applied to one attribute of each song.
pub enum AttributeTest {
    /// A typed predicate over the raw attribute value.
    Predicate(Box<dyn Fn(&str) -> bool>),
    /// A parsed textual expression.
    Expression(FilterExpr),
}

impl AttributeTest {
    /// Wrap a typed predicate.
    #[must_use]
    pub fn predicate(test: impl Fn(&str) -> bool + 'static) -> Self {
        Self::Predicate(Box::new(test))
    }

    /// Parse a textual expression (see [`FilterExpr::parse`]).
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidExpression`] for text outside the
    /// grammar.
    pub fn expression(text: &str) -> Result<Self> {
        Ok(Self::Expression(FilterExpr::parse(text)?))
    }

    fn evaluate(&self, value: &str) -> std::result::Result<bool, String> {
        match self {
            Self::Predicate(test) => Ok(test(value)),
            Self::Expression(expr) => expr.evaluate(value),
        }
    }

    fn describe(&self) -> &str {
        match self {
            Self::Predicate(_) => "<predicate>",
            Self::Expression(expr) => expr.raw(),
        }
    }
}

impl fmt::Debug for AttributeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Predicate(_) => f.write_str("AttributeTest::Predicate"),
            Self::Expression(expr) => write!(f, "AttributeTest::Expression({:?})", expr.raw()),
        }
    }
}

// =============================================================================
// Filters
// =============================================================================

/// Filter a list by one attribute.
///
/// Songs that do not carry `attribute` at all never match and end up in
/// neither polarity of the filter. For the rest, the attribute value is fed
/// to `test` and the song is kept exactly when the result equals `keep`
/// (`keep = false` inverts the filter). The result is a new list labeled
/// `label`; the input is never mutated.
///
/// # Errors
///
/// An evaluation failure (ordering against a non-numeric value) aborts the
/// whole call with [`FilterError::EvaluationFailed`] naming the failing song
/// and expression: once the predicate itself is broken, a partial result
/// would be misleading.
pub fn filter_by_attribute(
    list: &SongList,
    attribute: &str,
    test: &AttributeTest,
    label: &str,
    keep: bool,
) -> Result<SongList> {
    info!(
        "filtering {:?} ({} songs) on {attribute} with {:?}, keep = {keep}",
        list.name(),
        list.len(),
        test
    );

    let mut out = SongList::new(label);
    for song in list {
        if !song.has_attribute(attribute) {
            debug!(
                "{} has no attribute {attribute}",
                song.source_url().display()
            );
            continue;
        }

        let value = song.attribute(attribute);
        let matched = test.evaluate(value).map_err(|reason| {
            Error::Filter(FilterError::EvaluationFailed {
                expression: test.describe().to_string(),
                value: value.to_string(),
                song: song.source_url().to_path_buf(),
                reason,
            })
        })?;

        if matched == keep {
            out.push(Arc::clone(song));
        }
    }

    info!("kept {} of {} songs as {label:?}", out.len(), list.len());
    Ok(out)
}

/// Filter a list by acquisition recency.
///
/// A song is recent when its age in whole days is strictly less than `days`,
/// measured from its [`ATTR_ACQUIRED`] attribute (month/day/year) against
/// today. Songs without the attribute, or with an empty value, never match.
///
/// # Errors
///
/// A malformed date aborts the call with [`FilterError::InvalidDate`].
pub fn filter_recent(list: &SongList, days: i64, keep: bool) -> Result<SongList> {
    filter_recent_as_of(list, days, keep, Local::now().date_naive())
}

/// [`filter_recent`] with an explicit "today", for deterministic callers.
///
/// # Errors
///
/// A malformed date aborts the call with [`FilterError::InvalidDate`].
pub fn filter_recent_as_of(
    list: &SongList,
    days: i64,
    keep: bool,
    today: NaiveDate,
) -> Result<SongList> {
    let mut out = SongList::new(format!("{} recent", list.name()));
    for song in list {
        let value = song.attribute(ATTR_ACQUIRED);
        if value.is_empty() {
            debug!(
                "{} has no acquisition date",
                song.source_url().display()
            );
            continue;
        }

        let acquired = NaiveDate::parse_from_str(value, ACQUIRED_DATE_FORMAT).map_err(|e| {
            Error::Filter(FilterError::InvalidDate {
                value: value.to_string(),
                song: song.source_url().to_path_buf(),
                reason: e.to_string(),
            })
        })?;

        let age_days = (today - acquired).num_days();
        if (age_days < days) == keep {
            out.push(Arc::clone(song));
        }
    }
    Ok(out)
}

/// Deduplicate a list and, optionally, reconcile it against a directory tree.
///
/// Two criteria apply:
/// 1. Duplicate source paths within the list are always removed; the first
///    occurrence wins.
/// 2. With `target_path` given, each song's base file name is looked up in a
///    recursive index of the target tree. By default songs whose file name is
///    already present are excluded (the result is "what still needs
///    copying"); with `reverse = true` only songs whose file name is present
///    are kept (the result is "what can be deleted"). Without a target this
///    criterion does not apply for either polarity.
///
/// The presence check matches on base file name only, ignoring directories
/// and content, so same-named files from different sources are treated as
/// already present. This keeps repeated exports cheap but can skip a
/// legitimately different file that happens to share a name.
///
/// Returns a new list labeled `<name> unique`.
#[must_use]
pub fn filter_unique(list: &SongList, target_path: Option<&Path>, reverse: bool) -> SongList {
    let target_index = target_path.map(index_file_names);

    let mut seen: HashSet<&Path> = HashSet::new();
    let mut out = SongList::new(format!("{} unique", list.name()));
    for song in list {
        if seen.contains(song.source_url()) {
            debug!("duplicate source {}", song.source_url().display());
            continue;
        }

        if let Some(index) = &target_index {
            let present = song
                .source_url()
                .file_name()
                .is_some_and(|name| index.contains(name));
            if present != reverse {
                continue;
            }
        }

        seen.insert(song.source_url());
        out.push(Arc::clone(song));
    }

    debug!(
        "{:?}: {} of {} songs unique",
        list.name(),
        out.len(),
        list.len()
    );
    out
}

/// Recursive index of all file names under `target`.
fn index_file_names(target: &Path) -> HashSet<OsString> {
    WalkDir::new(target)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.path().is_file())
        .filter_map(|e| e.path().file_name().map(ToOwned::to_owned))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{ATTR_GENRE, ATTR_USER_RATING, Song, SongRef};
    use std::collections::HashSet as StdHashSet;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn rated(url: &str, rating: &str) -> SongRef {
        Arc::new(Song::new(url).with_attribute(ATTR_USER_RATING, rating))
    }

    fn sample_list() -> SongList {
        SongList::from_songs(
            "sample",
            vec![
                rated("/m/a.mp3", "50"),
                rated("/m/b.mp3", "80"),
                rated("/m/c.mp3", "100"),
                Arc::new(Song::new("/m/d.mp3")),
            ],
        )
    }

    fn urls(list: &SongList) -> Vec<PathBuf> {
        list.iter().map(|s| s.source_url().to_path_buf()).collect()
    }

    #[test]
    fn test_expression_numeric_comparison() {
        let test = AttributeTest::expression("attribute > 75").expect("parse");
        let kept = filter_by_attribute(&sample_list(), ATTR_USER_RATING, &test, "4-star", true)
            .expect("filter");
        assert_eq!(
            urls(&kept),
            vec![PathBuf::from("/m/b.mp3"), PathBuf::from("/m/c.mp3")]
        );
        assert_eq!(kept.name(), "4-star");
    }

    #[test]
    fn test_keep_false_inverts() {
        let test = AttributeTest::expression("attribute > 75").expect("parse");
        let removed = filter_by_attribute(&sample_list(), ATTR_USER_RATING, &test, "rest", false)
            .expect("filter");
        assert_eq!(urls(&removed), vec![PathBuf::from("/m/a.mp3")]);
    }

    #[test]
    fn test_partition_covers_attribute_bearing_songs() {
        let list = sample_list();
        let test = AttributeTest::expression("attribute >= 80").expect("parse");
        let kept =
            filter_by_attribute(&list, ATTR_USER_RATING, &test, "hi", true).expect("filter");
        let removed =
            filter_by_attribute(&list, ATTR_USER_RATING, &test, "lo", false).expect("filter");

        let kept_urls: StdHashSet<PathBuf> = urls(&kept).into_iter().collect();
        let removed_urls: StdHashSet<PathBuf> = urls(&removed).into_iter().collect();
        assert!(kept_urls.is_disjoint(&removed_urls));
        // The song without the attribute lands in neither polarity.
        assert_eq!(kept_urls.len() + removed_urls.len(), 3);
        assert!(!kept_urls.contains(Path::new("/m/d.mp3")));
        assert!(!removed_urls.contains(Path::new("/m/d.mp3")));
    }

    #[test]
    fn test_expression_string_equality() {
        let list = SongList::from_songs(
            "genres",
            vec![
                Arc::new(Song::new("/m/a.mp3").with_attribute(ATTR_GENRE, "Rock & Roll")),
                Arc::new(Song::new("/m/b.mp3").with_attribute(ATTR_GENRE, "Jazz")),
            ],
        );
        let test = AttributeTest::expression("attribute == \"Rock & Roll\"").expect("parse");
        let kept = filter_by_attribute(&list, ATTR_GENRE, &test, "rock", true).expect("filter");
        assert_eq!(urls(&kept), vec![PathBuf::from("/m/a.mp3")]);
    }

    #[test]
    fn test_expression_contains() {
        let list = SongList::from_songs(
            "genres",
            vec![
                Arc::new(Song::new("/m/a.mp3").with_attribute(ATTR_GENRE, "Rock & Roll")),
                Arc::new(Song::new("/m/b.mp3").with_attribute(ATTR_GENRE, "Jazz")),
            ],
        );
        let test = AttributeTest::expression("attribute contains Rock").expect("parse");
        let kept = filter_by_attribute(&list, ATTR_GENRE, &test, "rock", true).expect("filter");
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_quoted_number_compares_as_string() {
        let list = SongList::from_songs("r", vec![rated("/m/a.mp3", "050")]);
        // Quoting forces string semantics: "050" != "50".
        let test = AttributeTest::expression("attribute == '50'").expect("parse");
        let kept =
            filter_by_attribute(&list, ATTR_USER_RATING, &test, "x", true).expect("filter");
        assert!(kept.is_empty());

        // Unquoted compares numerically: 050 == 50.
        let test = AttributeTest::expression("attribute == 50").expect("parse");
        let kept =
            filter_by_attribute(&list, ATTR_USER_RATING, &test, "x", true).expect("filter");
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_invalid_expression_rejected() {
        assert!(AttributeTest::expression("rating > 75").is_err());
        assert!(AttributeTest::expression("attribute >").is_err());
        assert!(AttributeTest::expression("attribute between 1 and 2").is_err());
    }

    #[test]
    fn test_ordering_against_text_value_is_fatal() {
        let list = SongList::from_songs(
            "g",
            vec![Arc::new(Song::new("/m/a.mp3").with_attribute(ATTR_GENRE, "Rock"))],
        );
        let test = AttributeTest::expression("attribute > 75").expect("parse");
        let err = filter_by_attribute(&list, ATTR_GENRE, &test, "x", true)
            .expect_err("must abort");
        let text = err.to_string();
        assert!(text.contains("/m/a.mp3"));
        assert!(text.contains("attribute > 75"));
    }

    #[test]
    fn test_predicate_closure() {
        let test = AttributeTest::predicate(|value| value.len() > 2);
        let kept = filter_by_attribute(&sample_list(), ATTR_USER_RATING, &test, "long", true)
            .expect("filter");
        assert_eq!(urls(&kept), vec![PathBuf::from("/m/c.mp3")]);
    }

    fn acquired(url: &str, date: &str) -> SongRef {
        Arc::new(Song::new(url).with_attribute(ATTR_ACQUIRED, date))
    }

    #[test]
    fn test_filter_recent_strict_age_bound() {
        let today = NaiveDate::from_ymd_opt(2012, 8, 30).expect("valid date");
        let list = SongList::from_songs(
            "music",
            vec![
                acquired("/m/new.mp3", "8/25/2012"),
                acquired("/m/edge.mp3", "8/23/2012"),
                acquired("/m/old.mp3", "1/2/2012"),
                Arc::new(Song::new("/m/undated.mp3")),
            ],
        );

        // Ages: 5, 7, and 241 days. Strictly-less-than excludes the 7-day one.
        let recent = filter_recent_as_of(&list, 7, true, today).expect("filter");
        assert_eq!(urls(&recent), vec![PathBuf::from("/m/new.mp3")]);
        assert_eq!(recent.name(), "music recent");

        let stale = filter_recent_as_of(&list, 7, false, today).expect("filter");
        assert_eq!(
            urls(&stale),
            vec![PathBuf::from("/m/edge.mp3"), PathBuf::from("/m/old.mp3")]
        );
    }

    #[test]
    fn test_filter_recent_bad_date_is_fatal() {
        let today = NaiveDate::from_ymd_opt(2012, 8, 30).expect("valid date");
        let list = SongList::from_songs("m", vec![acquired("/m/a.mp3", "2012-08-25")]);
        assert!(filter_recent_as_of(&list, 7, true, today).is_err());
    }

    #[test]
    fn test_filter_unique_dedup_first_occurrence_wins() {
        let list = SongList::from_songs(
            "dupes",
            vec![
                rated("/m/a.mp3", "1"),
                rated("/m/b.mp3", "2"),
                rated("/m/a.mp3", "3"),
                rated("/m/c.mp3", "4"),
                rated("/m/b.mp3", "5"),
            ],
        );
        let unique = filter_unique(&list, None, false);
        assert_eq!(unique.name(), "dupes unique");
        assert_eq!(
            urls(&unique),
            vec![
                PathBuf::from("/m/a.mp3"),
                PathBuf::from("/m/b.mp3"),
                PathBuf::from("/m/c.mp3"),
            ]
        );
        // First occurrence kept: rating of the first /m/a.mp3 entry.
        assert_eq!(
            unique.get(0).expect("first").attribute(ATTR_USER_RATING),
            "1"
        );
    }

    #[test]
    fn test_filter_unique_against_target_directory() {
        let dir = TempDir::new().expect("create temp dir");
        fs::create_dir_all(dir.path().join("sub")).expect("create subdir");
        fs::write(dir.path().join("sub/b.mp3"), b"x").expect("write file");

        let list = SongList::from_songs(
            "sync",
            vec![rated("/m/a.mp3", "1"), rated("/m/b.mp3", "2")],
        );

        let missing = filter_unique(&list, Some(dir.path()), false);
        assert_eq!(urls(&missing), vec![PathBuf::from("/m/a.mp3")]);

        let present = filter_unique(&list, Some(dir.path()), true);
        assert_eq!(urls(&present), vec![PathBuf::from("/m/b.mp3")]);

        // The two polarities partition the deduplicated list.
        assert_eq!(missing.len() + present.len(), list.len());
    }

    #[test]
    fn test_filter_unique_without_target_ignores_reverse() {
        let list = SongList::from_songs("plain", vec![rated("/m/a.mp3", "1")]);
        assert_eq!(filter_unique(&list, None, true).len(), 1);
        assert_eq!(filter_unique(&list, None, false).len(), 1);
    }
}
