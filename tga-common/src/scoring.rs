//! Keyword-match genre scoring
//!
//! The probability that a text belongs to a genre is the number of distinct genre
//! keywords found in the text divided by the number of words in the text, expressed
//! as a whole percentage.
//!
//! This is the reference computation used by the classifier service. It has no I/O
//! so it can be exercised without a database or network.

use std::collections::BTreeSet;

/// Upper bound of a probability percentage
pub const MAX_PERCENT: i64 = 100;

/// Score `text` against a comma-separated keyword list
///
/// Returns 0 when either input is empty or the text contains no words.
///
/// # Examples
///
/// ```
/// use tga_common::scoring::score;
///
/// // 2 distinct keywords present, 5 words in the text
/// assert_eq!(score("Кот смотрит в окно утром", "кот, окно"), 40);
///
/// assert_eq!(score("", "кот"), 0);
/// assert_eq!(score("кот", ""), 0);
/// ```
pub fn score(text: &str, keywords: &str) -> i64 {
    if text.is_empty() || keywords.is_empty() {
        return 0;
    }

    let total_words = count_words(text);
    if total_words == 0 {
        return 0;
    }

    let matches = count_keyword_matches(text, keywords);
    let percent = (matches as f64 / total_words as f64 * 100.0).round() as i64;

    percent.min(MAX_PERCENT)
}

/// Split a keyword list into normalized (trimmed, lowercased, non-empty) keywords
pub fn parse_keywords(keywords: &str) -> BTreeSet<String> {
    keywords
        .split(',')
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .collect()
}

/// Count distinct keywords that occur anywhere in the text (substring match)
fn count_keyword_matches(text: &str, keywords: &str) -> usize {
    let haystack = text.to_lowercase();
    parse_keywords(keywords)
        .iter()
        .filter(|kw| haystack.contains(kw.as_str()))
        .count()
}

/// Count word tokens: maximal runs of letters, digits or underscores
fn count_words(text: &str) -> usize {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyrillic_text_scores_by_distinct_matches() {
        assert_eq!(score("Кот смотрит в окно утром", "кот, окно"), 40);
    }

    #[test]
    fn test_empty_inputs_score_zero() {
        assert_eq!(score("", "кот, окно"), 0);
        assert_eq!(score("some words here", ""), 0);
    }

    #[test]
    fn test_text_without_words_scores_zero() {
        // Punctuation only: no tokens, guards the division
        assert_eq!(score("... ,,, !!!", "кот"), 0);
    }

    #[test]
    fn test_repeated_keyword_counts_once() {
        // "cat" occurs three times but contributes a single match; 4 words
        assert_eq!(score("cat cat cat dog", "cat"), 25);
    }

    #[test]
    fn test_duplicate_keywords_in_list_count_once() {
        assert_eq!(score("cat dog", "cat, CAT ,cat"), 50);
    }

    #[test]
    fn test_keywords_are_case_and_whitespace_insensitive() {
        assert_eq!(score("The Old Man and the Sea", "  OLD ,  sea "), 33);
    }

    #[test]
    fn test_inflected_form_does_not_match_keyword() {
        // "окне" does not contain "окно": only "кот" matches, 4 words
        assert_eq!(score("кот сидит на окне", "кот, окно"), 25);
    }

    #[test]
    fn test_substring_match_counts() {
        // "дом" is found inside "домой"
        assert_eq!(score("пошёл домой", "дом"), 50);
    }

    #[test]
    fn test_result_clamped_to_hundred() {
        // One word but two keywords found inside it
        assert_eq!(score("sunflower", "sun, flower"), 100);
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        // 1 / 8 = 12.5% -> 13
        assert_eq!(score("a b c d e f g h", "a"), 13);
    }

    #[test]
    fn test_empty_segments_in_keyword_list_ignored() {
        assert_eq!(parse_keywords(" , кот,, ,окно, "), ["кот", "окно"].iter().map(|s| s.to_string()).collect());
    }

    #[test]
    fn test_word_count_handles_digits_and_underscores() {
        assert_eq!(count_words("chapter_1 has 42 pages"), 4);
        assert_eq!(count_words("  "), 0);
    }
}
