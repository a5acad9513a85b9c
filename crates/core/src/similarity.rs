/// Insertion/deletion edit distance (Levenshtein with substitutions costing
/// two), using the two-row O(min(m,n)) space algorithm over chars.
pub fn indel_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();
    let (m, n) = (a.len(), b.len());

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    // Keep the shorter string in the inner loop to minimise allocation.
    let (a, b, m, n) = if m <= n { (a, b, m, n) } else { (b, a, n, m) };

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = 2 * usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Similarity ratio in [0.0, 1.0]: `1 - indel / (len(a) + len(b))`.
///
/// Equals `2 * LCS / total`, so one dropped or doubled letter in a six-letter
/// word still scores above 0.9.
pub fn similarity(a: &str, b: &str) -> f32 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    1.0 - (indel_distance(a, b) as f32 / total as f32)
}

/// The candidate most similar to `needle`, if its score reaches `cutoff`.
/// Ties keep the earliest candidate.
pub fn closest_match<'a, I>(needle: &str, candidates: I, cutoff: f32) -> Option<(&'a str, f32)>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&'a str, f32)> = None;
    for candidate in candidates {
        let score = similarity(needle, candidate);
        if score < cutoff {
            continue;
        }
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_strings_are_zero() {
        assert_eq!(indel_distance("abc", "abc"), 0);
        assert_eq!(indel_distance("", ""), 0);
    }

    #[test]
    fn empty_string_is_length_of_other() {
        assert_eq!(indel_distance("", "abc"), 3);
        assert_eq!(indel_distance("abc", ""), 3);
    }

    #[test]
    fn substitution_costs_two() {
        assert_eq!(indel_distance("cat", "bat"), 2);
    }

    #[test]
    fn single_insertion_and_deletion() {
        assert_eq!(indel_distance("abc", "abcd"), 1);
        assert_eq!(indel_distance("abcd", "abc"), 1);
    }

    #[test]
    fn commutative() {
        assert_eq!(
            indel_distance("tomato", "tmaot"),
            indel_distance("tmaot", "tomato")
        );
    }

    #[test]
    fn similarity_bounds() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("milk", "milk"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn similarity_tolerates_one_extra_letter() {
        let score = similarity("tomatoe", "tomato");
        assert!(score > 0.9, "score was {score}");
    }

    #[test]
    fn closest_match_respects_cutoff() {
        let vocab = ["tomato", "potato", "onion"];
        assert_eq!(closest_match("tomatoe", vocab, 0.86).map(|m| m.0), Some("tomato"));
        assert_eq!(closest_match("xylophone", vocab, 0.86), None);
    }

    #[test]
    fn closest_match_prefers_highest_score() {
        let vocab = ["onion", "red onion"];
        assert_eq!(closest_match("red onio", vocab, 0.5).map(|m| m.0), Some("red onion"));
    }

    #[test]
    fn closest_match_tie_keeps_first_candidate() {
        // "chilli" is one deletion away from both.
        let vocab = ["chill", "chili"];
        assert_eq!(closest_match("chilli", vocab, 0.8).map(|m| m.0), Some("chill"));
    }
}
