//! Name ranking for symbol search

/// Score for an exact (case-insensitive) name match.
pub const EXACT_SCORE: u32 = 100;
/// Score when the name starts with the query.
pub const PREFIX_SCORE: u32 = 90;
/// Score when the name contains the query.
pub const CONTAINS_SCORE: u32 = 70;

const FUZZY_BASE: u32 = 60;
const FUZZY_STEP: u32 = 5;

/// Score a symbol name against a query. Zero means "not a match".
///
/// Exact, prefix and substring matches score 100, 90 and 70. Anything else
/// falls back to edit distance `d`, accepted while `d <= max(1, floor(0.3 * len(name)))`
/// and scored `max(1, 60 - 5d)`.
pub fn score_name(name: &str, query: &str) -> u32 {
    let name = name.to_lowercase();
    let query = query.to_lowercase();

    if name == query {
        return EXACT_SCORE;
    }
    if name.starts_with(&query) {
        return PREFIX_SCORE;
    }
    if name.contains(&query) {
        return CONTAINS_SCORE;
    }

    let distance = levenshtein_distance(&name, &query);
    if distance <= fuzzy_threshold(&name) {
        let penalty = FUZZY_STEP.saturating_mul(distance as u32);
        FUZZY_BASE.saturating_sub(penalty).max(1)
    } else {
        0
    }
}

/// Largest edit distance still accepted for `name`.
fn fuzzy_threshold(name: &str) -> usize {
    (name.chars().count() * 3 / 10).max(1)
}

/// Calculate Levenshtein distance between two strings
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    // Two rolling rows instead of the full matrix.
    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}
