//! Approximate matching of a typed query against a mark name.

const SCORE_MATCH: i64 = 16;
const BONUS_CONSECUTIVE: i64 = 8;
const BONUS_BOUNDARY: i64 = 10;
const BONUS_PREFIX: i64 = 24;
const PENALTY_GAP: i64 = 1;

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn is_boundary(chars: &[char], pos: usize) -> bool {
    let Some(&cur) = chars.get(pos) else {
        return false;
    };
    match pos.checked_sub(1).and_then(|p| chars.get(p)) {
        None => true,
        Some(&prev) => !prev.is_alphanumeric() || (prev.is_lowercase() && cur.is_uppercase()),
    }
}

/// Positions of the leftmost contiguous occurrence of `query` in `text`.
fn contiguous(text: &[char], query: &[char]) -> Option<Vec<usize>> {
    let start = text.windows(query.len()).position(|w| w == query)?;
    Some((start..start + query.len()).collect())
}

/// Positions of a greedy left-to-right subsequence match.
fn subsequence(text: &[char], query: &[char]) -> Option<Vec<usize>> {
    let mut positions = Vec::with_capacity(query.len());
    let mut from = 0;
    for q in query {
        let offset = text[from..].iter().position(|c| c == q)?;
        positions.push(from + offset);
        from += offset + 1;
    }
    Some(positions)
}

/// Score `text` against `query`. Higher is better; `None` means the query's
/// characters do not all appear in order. Matching ignores case and
/// whitespace in the query. An empty query matches everything with score 0.
pub fn score(query: &str, text: &str) -> Option<i64> {
    let query: Vec<char> = query
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(fold)
        .collect();
    if query.is_empty() {
        return Some(0);
    }

    let chars: Vec<char> = text.chars().collect();
    let folded: Vec<char> = chars.iter().copied().map(fold).collect();
    if folded.len() < query.len() {
        return None;
    }

    let positions = contiguous(&folded, &query).or_else(|| subsequence(&folded, &query))?;

    let mut total = 0;
    let mut prev: Option<usize> = None;
    for &pos in &positions {
        total += SCORE_MATCH;
        if is_boundary(&chars, pos) {
            total += BONUS_BOUNDARY;
        }
        match prev {
            Some(p) if pos == p + 1 => total += BONUS_CONSECUTIVE,
            Some(p) => total -= PENALTY_GAP * (pos - p - 1) as i64,
            None => {}
        }
        prev = Some(pos);
    }
    if positions.first() == Some(&0) {
        total += BONUS_PREFIX;
    }
    Some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_matches_everything() {
        assert_eq!(score("", "anything"), Some(0));
    }

    #[test]
    fn missing_characters_do_not_match() {
        assert_eq!(score("xyz", "parser entry"), None);
        assert_eq!(score("toolong", "short"), None);
    }

    #[test]
    fn case_is_ignored() {
        assert_eq!(score("PARSE", "parse"), score("parse", "parse"));
    }

    #[test]
    fn prefix_beats_infix() {
        let prefix = score("load", "load config").unwrap();
        let infix = score("load", "reload config").unwrap();
        assert!(prefix > infix);
    }

    #[test]
    fn contiguous_beats_scattered() {
        let tight = score("save", "save file").unwrap();
        let loose = score("save", "sxaxvxe").unwrap();
        assert!(tight > loose);
    }

    #[test]
    fn word_boundaries_earn_a_bonus() {
        let camel = score("fb", "fooBar").unwrap();
        let flat = score("fb", "foobar").unwrap();
        assert!(camel > flat);
    }
}
