//! Subsequence fuzzy matching and ranking.
//!
//! A query matches a target when every query character appears, in order and
//! ignoring case, somewhere in the target. Among all such alignments the
//! scorer picks the one that best rewards word starts and contiguous runs:
//!
//! | event | points |
//! |-------|--------|
//! | each matched character | [`MATCH_SCORE`] |
//! | match at index 0 | [`FIRST_CHAR_BONUS`] |
//! | match right after `-` `_` space `/` `.` | [`SEPARATOR_BONUS`] |
//! | match at a lower→upper transition | [`CAMEL_CASE_BONUS`] |
//! | match continuing an uppercase run | [`UPPERCASE_RUN_BONUS`] |
//! | match directly after the previous one | [`CONSECUTIVE_BONUS`] |
//! | skipping `g` characters since the previous match | `-min(g × 0.5, 3)` |
//!
//! The final score subtracts `(target_len - query_len) × 0.1` so shorter
//! targets win ties.
//!
//! ```rust
//! use cliflow_core::fuzzy::{fuzzy_match, rank};
//!
//! let m = fuzzy_match("co", "checkout").unwrap();
//! assert_eq!(m.positions, vec![0, 5]);
//!
//! let ranked = rank(vec!["checkout", "commit", "clone"], "co", |s| s);
//! assert_eq!(ranked, vec!["commit", "clone", "checkout"]);
//! ```

/// Points for every matched character.
pub const MATCH_SCORE: f64 = 3.0;
/// Bonus for matching the first character of the target.
pub const FIRST_CHAR_BONUS: f64 = 10.0;
/// Bonus for matching right after a separator.
pub const SEPARATOR_BONUS: f64 = 8.0;
/// Bonus for matching at a camelCase boundary.
pub const CAMEL_CASE_BONUS: f64 = 7.0;
/// Bonus for matching inside an uppercase run.
pub const UPPERCASE_RUN_BONUS: f64 = 2.0;
/// Bonus for matching directly after the previous matched character.
pub const CONSECUTIVE_BONUS: f64 = 4.0;
/// Penalty per skipped character.
pub const GAP_PENALTY: f64 = 0.5;
/// Cap on the penalty for a single gap.
pub const MAX_GAP_PENALTY: f64 = 3.0;
/// Penalty per character of length difference.
pub const LENGTH_PENALTY: f64 = 0.1;

const SEPARATORS: [char; 5] = ['-', '_', ' ', '/', '.'];

/// Result of a successful match.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    /// Higher is better; comparable only across targets for the same query
    pub score: f64,
    /// Character indices of the matched target characters, ascending
    pub positions: Vec<usize>,
}

/// Score `query` against `target`.
///
/// Returns `None` when `query` is not a case-insensitive subsequence of
/// `target`. An empty query matches everything with score 0.
#[must_use]
pub fn fuzzy_match(query: &str, target: &str) -> Option<FuzzyMatch> {
    if query.is_empty() {
        return Some(FuzzyMatch {
            score: 0.0,
            positions: Vec::new(),
        });
    }
    if target.is_empty() {
        return None;
    }

    let query: Vec<char> = query.chars().map(fold).collect();
    let original: Vec<char> = target.chars().collect();
    let folded: Vec<char> = original.iter().copied().map(fold).collect();

    if !is_subsequence(&query, &folded) {
        return None;
    }

    best_alignment(&query, &folded, &original)
}

/// Case-insensitive prefix test.
#[must_use]
pub fn is_prefix(query: &str, target: &str) -> bool {
    let mut target = target.chars().map(fold);
    query.chars().map(fold).all(|q| target.next() == Some(q))
}

/// Keep the items whose key matches `query`, best score first.
///
/// Ties keep their input order.
pub fn fuzzy_filter<T, F>(items: Vec<T>, query: &str, key: F) -> Vec<(T, FuzzyMatch)>
where
    F: Fn(&T) -> &str,
{
    let mut matched: Vec<(T, FuzzyMatch)> = items
        .into_iter()
        .filter_map(|item| {
            let m = fuzzy_match(query, key(&item))?;
            Some((item, m))
        })
        .collect();
    matched.sort_by(|(_, a), (_, b)| b.score.total_cmp(&a.score));
    matched
}

/// Order items for display against the partial token `query`.
///
/// An empty query returns `items` untouched. Otherwise non-matching items are
/// dropped, prefix matches come first in their input order, and the remaining
/// fuzzy matches follow by descending score.
pub fn rank<T, F>(items: Vec<T>, query: &str, key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    if query.is_empty() {
        return items;
    }

    let (mut prefix, rest): (Vec<T>, Vec<T>) =
        items.into_iter().partition(|item| is_prefix(query, key(item)));
    prefix.extend(fuzzy_filter(rest, query, &key).into_iter().map(|(item, _)| item));
    prefix
}

fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn is_subsequence(query: &[char], target: &[char]) -> bool {
    let mut remaining = target.iter();
    query.iter().all(|q| remaining.any(|t| t == q))
}

fn position_bonus(original: &[char], idx: usize) -> f64 {
    if idx == 0 {
        return FIRST_CHAR_BONUS;
    }
    let prev = original[idx - 1];
    let curr = original[idx];
    if SEPARATORS.contains(&prev) {
        SEPARATOR_BONUS
    } else if prev.is_lowercase() && curr.is_uppercase() {
        CAMEL_CASE_BONUS
    } else if prev.is_uppercase() && curr.is_uppercase() {
        UPPERCASE_RUN_BONUS
    } else {
        0.0
    }
}

/// Dynamic program over (query char, target char).
///
/// `score[i][j]` is the best score with query char `i` matched at target
/// index `j`; `from[i][j]` is the target index of query char `i - 1` on that
/// best path.
fn best_alignment(query: &[char], folded: &[char], original: &[char]) -> Option<FuzzyMatch> {
    let qlen = query.len();
    let tlen = folded.len();
    let mut score = vec![vec![f64::NEG_INFINITY; tlen]; qlen];
    let mut from = vec![vec![usize::MAX; tlen]; qlen];

    for (i, &q) in query.iter().enumerate() {
        for j in 0..tlen {
            if folded[j] != q {
                continue;
            }
            let base = MATCH_SCORE + position_bonus(original, j);

            if i == 0 {
                score[0][j] = base;
                continue;
            }

            let prev = &score[i - 1];
            let mut best = f64::NEG_INFINITY;
            let mut best_from = usize::MAX;

            if j > 0 && prev[j - 1].is_finite() {
                best = prev[j - 1] + base + CONSECUTIVE_BONUS;
                best_from = j - 1;
            }

            for k in 0..j.saturating_sub(1) {
                if !prev[k].is_finite() {
                    continue;
                }
                #[allow(clippy::cast_precision_loss)]
                let gap = (j - k - 1) as f64;
                let candidate = prev[k] + base - (gap * GAP_PENALTY).min(MAX_GAP_PENALTY);
                if candidate > best {
                    best = candidate;
                    best_from = k;
                }
            }

            score[i][j] = best;
            from[i][j] = best_from;
        }
    }

    let last = qlen - 1;
    let (end, &best) = score[last]
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .fold(None, |acc: Option<(usize, &f64)>, (j, s)| match acc {
            Some((_, best)) if best >= s => acc,
            _ => Some((j, s)),
        })?;

    let mut positions = vec![0; qlen];
    let mut j = end;
    for i in (0..qlen).rev() {
        positions[i] = j;
        if i > 0 {
            j = from[i][j];
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let length_penalty = (tlen - qlen) as f64 * LENGTH_PENALTY;

    Some(FuzzyMatch {
        score: best - length_penalty,
        positions,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_query_scores_zero() {
        let m = fuzzy_match("", "anything").unwrap();
        assert_eq!(m.score, 0.0);
        assert!(m.positions.is_empty());
        assert_eq!(fuzzy_match("", "").unwrap().score, 0.0);
    }

    #[test]
    fn test_empty_target_never_matches() {
        assert!(fuzzy_match("a", "").is_none());
    }

    #[test]
    fn test_out_of_order_characters_do_not_match() {
        assert!(fuzzy_match("ba", "ab").is_none());
        assert!(fuzzy_match("xyz", "checkout").is_none());
    }

    #[test]
    fn test_case_insensitive() {
        assert!(fuzzy_match("GIT", "git").is_some());
        assert!(fuzzy_match("git", "GIT").is_some());
    }

    #[test]
    fn test_exact_prefix_score() {
        // 3 chars at index 0..3: (3+10) + (3+4) + (3+4) minus no length penalty
        let m = fuzzy_match("abc", "abc").unwrap();
        assert_eq!(m.positions, vec![0, 1, 2]);
        assert!((m.score - 27.0).abs() < 1e-9);
    }

    #[test]
    fn test_separator_boundary_beats_inner_match() {
        // "r" can match the inner 'r' of "fork" or the start of "remote"
        let m = fuzzy_match("fr", "fork-remote").unwrap();
        assert_eq!(m.positions, vec![0, 5]);
    }

    #[test]
    fn test_camel_case_boundary() {
        let m = fuzzy_match("gb", "getBranch").unwrap();
        assert_eq!(m.positions, vec![0, 3]);
        let plain = fuzzy_match("gb", "getbranch").unwrap();
        assert!(m.score > plain.score);
    }

    #[test]
    fn test_positions_follow_the_winning_path() {
        // Best path picks the word starts, not the earliest occurrences.
        let m = fuzzy_match("ab", "xaxb-a-b").unwrap();
        assert_eq!(m.positions.len(), 2);
        assert!(m.positions[0] < m.positions[1]);
        let chars: Vec<char> = "xaxb-a-b".chars().collect();
        assert_eq!(chars[m.positions[0]], 'a');
        assert_eq!(chars[m.positions[1]], 'b');
    }

    #[test]
    fn test_shorter_target_wins_tie() {
        let short = fuzzy_match("co", "commit").unwrap();
        let long = fuzzy_match("co", "commitment").unwrap();
        assert!(short.score > long.score);
    }

    #[test]
    fn test_rank_prefix_first_in_input_order() {
        let items = vec!["recheckout", "checkout", "cherry-pick", "clone", "commit"];
        let ranked = rank(items, "ch", |s| s);
        assert_eq!(ranked, vec!["checkout", "cherry-pick", "recheckout"]);
    }

    #[test]
    fn test_rank_empty_query_is_identity() {
        let items = vec!["b", "a", "c"];
        assert_eq!(rank(items.clone(), "", |s| s), items);
    }

    #[test]
    fn test_rank_drops_non_matches() {
        let ranked = rank(vec!["push", "pull", "status"], "pl", |s| s);
        assert_eq!(ranked, vec!["pull"]);
    }

    #[test]
    fn test_is_prefix_ignores_case() {
        assert!(is_prefix("Che", "checkout"));
        assert!(!is_prefix("checkouts", "checkout"));
        assert!(is_prefix("", "x"));
    }

    #[test]
    fn test_fuzzy_filter_sorts_by_score() {
        let filtered = fuzzy_filter(vec!["xxaxxb", "ab"], "ab", |s| s);
        assert_eq!(filtered[0].0, "ab");
        assert_eq!(filtered.len(), 2);
    }

    proptest! {
        #[test]
        fn prop_non_subsequence_never_matches(target in "[a-m]{0,12}", extra in "[n-z]") {
            let query = format!("{target}{extra}");
            prop_assert!(fuzzy_match(&query, &target).is_none());
        }

        #[test]
        fn prop_match_positions_spell_the_query(query in "[a-d]{1,4}", target in "[a-dA-D_-]{0,16}") {
            if let Some(m) = fuzzy_match(&query, &target) {
                let chars: Vec<char> = target.chars().collect();
                prop_assert_eq!(m.positions.len(), query.chars().count());
                prop_assert!(m.positions.windows(2).all(|w| w[0] < w[1]));
                for (q, &p) in query.chars().zip(&m.positions) {
                    prop_assert_eq!(chars[p].to_ascii_lowercase(), q);
                }
            }
        }

        #[test]
        fn prop_prefix_matches_rank_before_fuzzy(
            items in prop::collection::vec("[a-e]{1,6}", 0..12),
            query in "[a-e]{1,2}",
        ) {
            let ranked = rank(items.clone(), &query, String::as_str);
            let first_fuzzy = ranked.iter().position(|s| !is_prefix(&query, s));
            if let Some(idx) = first_fuzzy {
                prop_assert!(ranked[idx..].iter().all(|s| !is_prefix(&query, s)));
            }
            let expected_prefix: Vec<&String> =
                items.iter().filter(|s| is_prefix(&query, s)).collect();
            let actual_prefix: Vec<&String> =
                ranked.iter().filter(|s| is_prefix(&query, s)).collect();
            prop_assert_eq!(expected_prefix, actual_prefix);
        }
    }
}
