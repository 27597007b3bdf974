//! Filter expressions and `sort:` directives.
//!
//! A filter is a small boolean language: whitespace (or `&`) is AND, `|` is OR,
//! parentheses group, double quotes protect spaces and operators, and `\` escapes
//! the next character. Terms are either substring tests against an item's
//! searchable tokens or exact `key:value` comparisons. `sort:` clauses embedded in
//! the same text are pulled out by [`extract_sort`] before evaluation.

pub mod filter;
pub mod sort;

pub use filter::matches;
pub use sort::{extract_sort, merge_sorted, SortDirective, SortOrder};

/// Properties that support exact `key:value` matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKey {
    Id,
    Fid,
    Artist,
    Album,
    Title,
}

impl FieldKey {
    pub fn parse(key: &str) -> Option<Self> {
        match key.to_ascii_lowercase().as_str() {
            "id" => Some(FieldKey::Id),
            "fid" => Some(FieldKey::Fid),
            "artist" => Some(FieldKey::Artist),
            "album" => Some(FieldKey::Album),
            "title" => Some(FieldKey::Title),
            _ => None,
        }
    }
}

/// Properties usable as `sort:` criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Plays,
    Artist,
    Title,
    Album,
    Modified,
    Track,
}

impl SortKey {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "plays" => Some(SortKey::Plays),
            "artist" => Some(SortKey::Artist),
            "title" => Some(SortKey::Title),
            "album" => Some(SortKey::Album),
            "modified" => Some(SortKey::Modified),
            "track" => Some(SortKey::Track),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Plays => "plays",
            SortKey::Artist => "artist",
            SortKey::Title => "title",
            SortKey::Album => "album",
            SortKey::Modified => "modified",
            SortKey::Track => "track",
        }
    }
}

/// A sortable property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Number(f64),
    /// Milliseconds since the epoch.
    Timestamp(f64),
    Missing,
}

impl PropertyValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            PropertyValue::Number(n) | PropertyValue::Timestamp(n) => Some(*n),
            PropertyValue::Text(s) => s.trim().parse().ok(),
            PropertyValue::Missing => None,
        }
    }

    /// Loose `>=`: numbers numerically, text lexicographically, missing values are least.
    /// Text against a number compares numerically and is false when the text is not a number.
    pub fn loose_ge(&self, other: &PropertyValue) -> bool {
        use PropertyValue::*;
        match (self, other) {
            (Missing, Missing) => true,
            (Missing, _) => false,
            (_, Missing) => true,
            (Text(a), Text(b)) => a >= b,
            (a, b) => match (a.as_number(), b.as_number()) {
                (Some(x), Some(y)) => x >= y,
                _ => false,
            },
        }
    }

    /// Strict equality: same variant and same value. `NaN` is never equal to itself.
    pub fn strict_eq(&self, other: &PropertyValue) -> bool {
        self == other
    }
}

/// An item the filter language and sort directives can inspect.
pub trait Searchable {
    /// Value of a field for exact `key:value` matching.
    fn field(&self, key: FieldKey) -> Option<&str>;

    /// Lowercase strings substring terms are tested against.
    fn search_tokens(&self) -> &[String];

    fn property(&self, key: SortKey) -> PropertyValue;

    fn matches_filter(&self, filter: &str) -> bool
    where
        Self: Sized,
    {
        filter::matches(self, filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_sort_lowest() {
        let missing = PropertyValue::Missing;
        let text = PropertyValue::Text("abc".into());
        assert!(!missing.loose_ge(&text));
        assert!(text.loose_ge(&missing));
    }

    #[test]
    fn text_and_number_compare_numerically_when_possible() {
        assert!(PropertyValue::Text("10".into()).loose_ge(&PropertyValue::Number(9.0)));
        assert!(!PropertyValue::Text("abc".into()).loose_ge(&PropertyValue::Number(1.0)));
        assert!(!PropertyValue::Number(1.0).loose_ge(&PropertyValue::Text("abc".into())));
    }

    #[test]
    fn nan_is_not_strictly_equal() {
        let nan = PropertyValue::Number(f64::NAN);
        assert!(!nan.strict_eq(&nan));
    }

    #[test]
    fn keys_parse_case_insensitively() {
        assert_eq!(FieldKey::parse("Artist"), Some(FieldKey::Artist));
        assert_eq!(FieldKey::parse("genre"), None);
        assert_eq!(SortKey::parse("MODIFIED"), Some(SortKey::Modified));
    }
}
