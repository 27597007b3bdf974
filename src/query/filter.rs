use std::sync::OnceLock;
use regex::Regex;
use super::{FieldKey, Searchable};

fn escape_regex() -> &'static Regex {
    static ESCAPE: OnceLock<Regex> = OnceLock::new();
    ESCAPE.get_or_init(|| Regex::new(r"\\(.)").expect("escape pattern is valid"))
}

/// Evaluate `filter` against `item`.
///
/// Never fails: unbalanced parentheses or quotes fall through to plain substring
/// matching. An empty filter matches everything.
pub fn matches<T: Searchable + ?Sized>(item: &T, filter: &str) -> bool {
    if filter.is_empty() {
        return true;
    }

    if wraps_whole(filter) {
        return matches(item, &filter[1..filter.len() - 1]);
    }

    let normalized = normalize(filter);
    let filter = normalized.as_str();

    if filter.is_empty() {
        return true;
    }

    if let Some(i) = find_top_level(filter, b'|') {
        let left = matches(item, &filter[..i]);
        let right = matches(item, &filter[i + 1..]);
        return left || right;
    }

    if let Some(i) = find_top_level(filter, b' ') {
        return matches_both(item, &filter[..i], &filter[i + 1..]);
    }

    matches_term(item, strip_quotes(filter))
}

/// `&` is a separator like a space; runs of spaces collapse to one.
fn normalize(filter: &str) -> String {
    let replaced = filter.replace('&', " ");
    let mut out = String::with_capacity(replaced.len());
    let mut last_space = false;

    for c in replaced.trim().chars() {
        if c == ' ' {
            if !last_space {
                out.push(c);
            }
            last_space = true;
        } else {
            out.push(c);
            last_space = false;
        }
    }

    out
}

/// True when the opening `(` at index 0 is closed by the last character.
fn wraps_whole(filter: &str) -> bool {
    let bytes = filter.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'(' || bytes[bytes.len() - 1] != b')' {
        return false;
    }

    let mut depth = 0usize;
    let mut quoted = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'"' => quoted = !quoted,
            b'(' if !quoted => depth += 1,
            b')' if !quoted && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return i == bytes.len() - 1;
                }
            }
            _ => {}
        }
        i += 1;
    }

    false
}

/// Byte index of the first `op` outside quotes and parentheses.
///
/// The byte after a `\` is skipped, so escaped quotes and parens never change
/// state. A `)` at depth zero is an ordinary character.
pub(crate) fn find_top_level(filter: &str, op: u8) -> Option<usize> {
    let bytes = filter.as_bytes();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if c == b'\\' {
            i += 2;
            continue;
        }

        if c == b'"' {
            quoted = !quoted;
        } else if !quoted {
            if c == b'(' {
                depth += 1;
            } else if c == b')' && depth > 0 {
                depth -= 1;
            } else if c == op && depth == 0 {
                return Some(i);
            }
        }

        i += 1;
    }

    None
}

fn strip_quotes(term: &str) -> &str {
    if term.len() > 1 && term.starts_with('"') && term.ends_with('"') {
        &term[1..term.len() - 1]
    } else {
        term
    }
}

fn matches_both<T: Searchable + ?Sized>(item: &T, left: &str, right: &str) -> bool {
    let l = matches(item, left);
    let r = matches(item, right);
    if l && r {
        return true;
    }

    if !is_keyed_term(left) {
        return false;
    }

    // `artist:daft punk`: the value may run on over following plain words.
    let mut value = left.to_string();
    let mut rest = right;

    loop {
        let (word, tail) = match find_top_level(rest, b' ') {
            Some(i) => (&rest[..i], &rest[i + 1..]),
            None => (rest, ""),
        };

        if !is_plain_word(word) {
            return false;
        }

        value.push(' ');
        value.push_str(word);

        if matches_term(item, &value) && matches(item, tail) {
            return true;
        }

        if tail.is_empty() {
            return false;
        }
        rest = tail;
    }
}

fn is_keyed_term(term: &str) -> bool {
    !term.contains(['(', ')', '"'])
        && term
            .split_once(':')
            .is_some_and(|(key, _)| FieldKey::parse(key).is_some())
}

fn is_plain_word(word: &str) -> bool {
    !word.is_empty() && !word.contains(['(', ')', '"', '|']) && !is_keyed_term(word)
}

fn matches_term<T: Searchable + ?Sized>(item: &T, term: &str) -> bool {
    let term = escape_regex().replace_all(term, "$1");

    if let Some((key, rest)) = term.split_once(':') {
        if let Some(key) = FieldKey::parse(key) {
            let value = strip_quotes(rest.split(':').next().unwrap_or_default()).to_lowercase();
            return item
                .field(key)
                .is_some_and(|field| field.to_lowercase() == value);
        }
    }

    let needle = term.to_lowercase();
    item.search_tokens().iter().any(|token| token.contains(&needle))
}
