use std::fmt;
use super::{Searchable, SortKey};

/// A parsed `sort:criteria[:order]` clause.
///
/// Unknown criteria are kept as `None` and compare equal, so they fall through to
/// the next criterion.
#[derive(Debug, Clone, PartialEq)]
pub struct SortDirective {
    pub criteria: Vec<Option<SortKey>>,
    pub ascending: bool,
}

impl SortDirective {
    /// `criteria` is comma separated; only the first letter of `order` counts
    /// (`a…` ascending, anything else descending). No order means ascending.
    pub fn from_parts(criteria: &str, order: Option<&str>) -> Self {
        Self {
            criteria: criteria.split(',').map(SortKey::parse).collect(),
            ascending: order.map_or(true, |o| o.starts_with('a')),
        }
    }

    /// Parse the body of a directive without the `sort:` prefix, e.g. `artist,title:desc`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        let text = text.strip_prefix("sort:").unwrap_or(&text);
        if text.is_empty() {
            return None;
        }

        Some(match text.split_once(':') {
            Some((criteria, order)) => Self::from_parts(criteria, Some(order)),
            None => Self::from_parts(text, None),
        })
    }

    /// True when `a` belongs before `b`.
    ///
    /// Equal values fall through to the next criterion; the first unequal pair
    /// decides with `(a >= b) XOR ascending`.
    pub fn before<T: Searchable + ?Sized>(&self, a: &T, b: &T) -> bool {
        for key in self.criteria.iter().flatten() {
            let pa = a.property(*key);
            let pb = b.property(*key);

            if pa.strict_eq(&pb) {
                continue;
            }

            return pa.loose_ge(&pb) ^ self.ascending;
        }

        false
    }
}

impl fmt::Display for SortDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let criteria = self
            .criteria
            .iter()
            .map(|key| key.map_or("?", |k| k.as_str()))
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "sort:{}:{}", criteria, if self.ascending { "asc" } else { "desc" })
    }
}

/// Ordering applied to a playlist.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SortOrder {
    /// Keep the current order.
    #[default]
    Natural,
    By(SortDirective),
}

/// Pull every `sort:` clause out of `filter`.
///
/// Returns the lowercased filter with the clauses removed and the last directive
/// found. Quotes suppress recognition. Inside parentheses a `)` also ends the
/// clause. After each removal the scan starts over from the beginning.
pub fn extract_sort(filter: &str) -> (String, Option<SortDirective>) {
    let mut filter = filter.to_lowercase();
    let mut directive = None;
    let mut quoted = false;
    let mut depth = 0usize;
    let mut i = 0;

    while i < filter.len() {
        let bytes = filter.as_bytes();
        match bytes[i] {
            b'"' => {
                quoted = !quoted;
                i += 1;
                continue;
            }
            b'(' => {
                depth += 1;
                i += 1;
                continue;
            }
            b')' if depth > 0 => {
                depth -= 1;
                i += 1;
                continue;
            }
            _ => {}
        }

        if quoted || !bytes[i..].starts_with(b"sort:") {
            i += 1;
            continue;
        }

        let rest = &filter[i + 5..];
        let space = rest.find(' ');
        let colon = rest.find(':');
        let mut end = space;

        if depth > 0 {
            if let Some(paren) = rest.find(')') {
                if space.map_or(true, |s| paren < s) {
                    end = Some(paren);
                }
            }
        }

        let end_or_len = end.unwrap_or(rest.len());
        let found = match (end, colon) {
            (Some(e), Some(c)) if c < e => {
                let order = &rest[c + 1..];
                let order = order.split(' ').next().unwrap_or_default();
                SortDirective::from_parts(&rest[..c], Some(order))
            }
            (None, Some(c)) => {
                let order = &rest[c + 1..];
                let order = order.split(' ').next().unwrap_or_default();
                SortDirective::from_parts(&rest[..c], Some(order))
            }
            _ => SortDirective::from_parts(&rest[..end_or_len], None),
        };

        log::debug!("extracted {} from filter '{}'", found, filter);
        directive = Some(found);

        filter = format!("{}{}", &filter[..i], &filter[i + 5 + end_or_len..]);
        i = 0;
        quoted = false;
        depth = 0;
    }

    (filter, directive)
}

/// Stable merge sort driven by a "belongs before" predicate.
///
/// An element from the right half only overtakes one from the left half when the
/// predicate says so, so ties keep their relative order.
pub fn merge_sorted<T, F>(items: Vec<T>, before: &F) -> Vec<T>
where
    F: Fn(&T, &T) -> bool,
{
    if items.len() <= 1 {
        return items;
    }

    let mut left = items;
    let right = left.split_off(left.len() / 2);
    let left = merge_sorted(left, before);
    let right = merge_sorted(right, before);

    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut l = left.into_iter().peekable();
    let mut r = right.into_iter().peekable();

    loop {
        let take_right = match (l.peek(), r.peek()) {
            (Some(x), Some(y)) => before(y, x),
            (Some(_), None) => false,
            (None, Some(_)) => true,
            (None, None) => break,
        };

        let next = if take_right { r.next() } else { l.next() };
        merged.extend(next);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FileId, Song, SongMetadata};
    use pretty_assertions::assert_eq;

    fn song(id: &str, artist: &str, title: &str, plays: u32) -> Song {
        Song::new(
            format!("/music/{}.mp3", id),
            FileId::new(id),
            0.0,
            SongMetadata {
                title: title.into(),
                artist: artist.into(),
                plays,
                ..Default::default()
            },
        )
    }

    fn ids(songs: &[Song]) -> Vec<&str> {
        songs.iter().map(|s| s.fid.as_str()).collect()
    }

    #[test]
    fn extracts_criteria_and_order() {
        let (rest, directive) = extract_sort("sort:artist,title:desc some text");
        assert_eq!(rest, " some text");
        let directive = directive.unwrap();
        assert_eq!(directive.criteria, vec![Some(SortKey::Artist), Some(SortKey::Title)]);
        assert!(!directive.ascending);
    }

    #[test]
    fn criteria_only_defaults_to_ascending() {
        let (rest, directive) = extract_sort("rock sort:plays");
        assert_eq!(rest, "rock ");
        assert_eq!(directive, Some(SortDirective::from_parts("plays", None)));
        assert!(directive.unwrap().ascending);
    }

    #[test]
    fn paren_closes_directive() {
        let (rest, directive) = extract_sort("(sort:title) rock");
        assert_eq!(rest, "() rock");
        assert_eq!(directive.unwrap().criteria, vec![Some(SortKey::Title)]);
    }

    #[test]
    fn quotes_suppress_directives() {
        let (rest, directive) = extract_sort("\"sort:title\" x");
        assert_eq!(rest, "\"sort:title\" x");
        assert!(directive.is_none());
    }

    #[test]
    fn later_directives_override_earlier_ones() {
        let (rest, directive) = extract_sort("sort:title sort:artist:desc");
        assert_eq!(rest, " ");
        let directive = directive.unwrap();
        assert_eq!(directive.criteria, vec![Some(SortKey::Artist)]);
        assert!(!directive.ascending);
    }

    #[test]
    fn empty_order_token_is_descending() {
        let (_, directive) = extract_sort("SORT:Artist:");
        assert!(!directive.unwrap().ascending);
    }

    #[test]
    fn no_directive_leaves_text_lowercased() {
        assert_eq!(extract_sort("Daft Punk"), ("daft punk".to_string(), None));
    }

    #[test]
    fn composite_comparator_falls_through_on_ties() {
        let directive = SortDirective::parse("artist,title").unwrap();
        let a = song("1", "Air", "B", 0);
        let b = song("2", "Air", "A", 0);
        let c = song("3", "Beck", "A", 0);
        assert!(directive.before(&b, &a));
        assert!(!directive.before(&a, &b));
        assert!(directive.before(&a, &c));

        let sorted = merge_sorted(vec![c.clone(), a.clone(), b.clone()], &|x: &Song, y: &Song| {
            directive.before(x, y)
        });
        assert_eq!(ids(&sorted), vec!["2", "1", "3"]);
    }

    #[test]
    fn descending_numbers() {
        let directive = SortDirective::parse("plays:desc").unwrap();
        let sorted = merge_sorted(
            vec![song("a", "", "", 1), song("b", "", "", 5), song("c", "", "", 3)],
            &|x: &Song, y: &Song| directive.before(x, y),
        );
        assert_eq!(ids(&sorted), vec!["b", "c", "a"]);
    }

    #[test]
    fn unknown_criteria_keep_order() {
        let directive = SortDirective::parse("bogus").unwrap();
        let input = vec![song("x", "B", "", 0), song("y", "A", "", 0), song("z", "C", "", 0)];
        let sorted = merge_sorted(input, &|x: &Song, y: &Song| directive.before(x, y));
        assert_eq!(ids(&sorted), vec!["x", "y", "z"]);
    }

    #[test]
    fn merge_sort_is_stable_and_idempotent() {
        let directive = SortDirective::parse("artist").unwrap();
        let input = vec![
            song("1", "B", "", 0),
            song("2", "A", "", 0),
            song("3", "B", "", 0),
            song("4", "A", "", 0),
        ];
        let before = |x: &Song, y: &Song| directive.before(x, y);
        let once = merge_sorted(input, &before);
        assert_eq!(ids(&once), vec!["2", "4", "1", "3"]);
        let twice = merge_sorted(once.clone(), &before);
        assert_eq!(ids(&twice), ids(&once));
    }

    #[test]
    fn display_round_trips_through_parse() {
        let directive = SortDirective::parse("artist,title:desc").unwrap();
        assert_eq!(directive.to_string(), "sort:artist,title:desc");
        assert_eq!(SortDirective::parse(&directive.to_string()), Some(directive));
    }
}
