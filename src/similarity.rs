//! Name similarity helpers used by the column mapper.
//!
//! Fuzzy matching relies on the Dice coefficient over character bigrams:
//! `2 * |shared bigrams| / (|bigrams(a)| + |bigrams(b)|)`. Bigrams are counted
//! as a multiset, so a pair repeated in both names contributes once per
//! occurrence on the smaller side.

use std::collections::HashMap;

/// Contiguous two-character windows of `value`, in order.
pub fn bigrams(value: &str) -> Vec<(char, char)> {
    let chars: Vec<char> = value.chars().collect();
    chars.windows(2).map(|pair| (pair[0], pair[1])).collect()
}

/// Dice coefficient of the bigram multisets of `left` and `right`.
///
/// Identical strings score `1.0`. Otherwise a string shorter than two
/// characters has no bigrams and scores `0.0`. Comparison is case-sensitive;
/// callers lower-case names first.
pub fn dice_similarity(left: &str, right: &str) -> f64 {
    if left == right {
        return 1.0;
    }
    if left.chars().count() < 2 || right.chars().count() < 2 {
        return 0.0;
    }

    let left_bigrams = bigrams(left);
    let right_bigrams = bigrams(right);

    let mut counts: HashMap<(char, char), usize> = HashMap::new();
    for pair in &left_bigrams {
        *counts.entry(*pair).or_insert(0) += 1;
    }

    let mut shared = 0usize;
    for pair in &right_bigrams {
        match counts.get_mut(pair) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                shared += 1;
            }
            _ => {}
        }
    }

    (2 * shared) as f64 / (left_bigrams.len() + right_bigrams.len()) as f64
}

/// Case-insensitive similarity of two column names.
pub fn name_similarity(left: &str, right: &str) -> f64 {
    dice_similarity(&left.to_lowercase(), &right.to_lowercase())
}

/// Lower-cases `name` and drops underscores, hyphens, and whitespace.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| !(*c == '_' || *c == '-' || c.is_whitespace()))
        .flat_map(char::to_lowercase)
        .collect()
}
