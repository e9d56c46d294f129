use unicode_normalization::UnicodeNormalization;

/// Punctuation and bracket characters stripped during normalization.
const DELETE_PUNCTUATION: &[char] = &[
    '、', '。', ',', '.', '!', '！', '?', '？', '「', '」', '『', '』', '（', '）', '(', ')',
    '[', ']', '{', '}', '"', '\'', '`',
];

/// Unicode NFKC, lowercasing, katakana->hiragana folding, whitespace
/// deletion, and punctuation stripping. Idempotent: `normalize(normalize(s))
/// == normalize(s)`.
pub fn normalize(text: &str) -> String {
    let nfkc: String = text.nfkc().collect();
    let lowered = nfkc.to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    for ch in lowered.chars() {
        if ch.is_whitespace() || ch == '\u{3000}' {
            continue;
        }
        if DELETE_PUNCTUATION.contains(&ch) {
            continue;
        }
        out.push(katakana_to_hiragana(ch));
    }
    out
}

/// Folds a single katakana codepoint in U+30A1..=U+30F6 to its hiragana
/// counterpart by subtracting 0x60; leaves every other character untouched.
fn katakana_to_hiragana(ch: char) -> char {
    let cp = ch as u32;
    if (0x30A1..=0x30F6).contains(&cp) {
        char::from_u32(cp - 0x60).unwrap_or(ch)
    } else {
        ch
    }
}

/// Returns the first vocabulary word whose normalized form is a non-empty
/// substring of `normalize(text)`, along with that original (un-normalized)
/// vocabulary word.
pub fn match_vocabulary<'a>(text: &str, vocabulary: &'a [String]) -> Option<(bool, &'a str)> {
    let normalized_text = normalize(text);
    for word in vocabulary {
        let normalized_word = normalize(word);
        if !normalized_word.is_empty() && normalized_text.contains(&normalized_word) {
            return Some((true, word.as_str()));
        }
    }
    None
}

/// Strips every occurrence of every vocabulary word's normalized form from
/// the normalized text, returning the residue. Used to detect the
/// zero-residue anti-self-wake case.
pub fn strip_vocabulary(text: &str, vocabulary: &[String]) -> String {
    let mut residue = normalize(text);
    for word in vocabulary {
        let normalized_word = normalize(word);
        if !normalized_word.is_empty() {
            residue = residue.replace(normalized_word.as_str(), "");
        }
    }
    residue
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_is_idempotent() {
        let s = "ヤタガラス　です。!!";
        assert_eq!(normalize(&normalize(s)), normalize(s));
    }

    #[test]
    fn katakana_folds_to_hiragana() {
        assert_eq!(normalize("ヤタガラス"), normalize("やたがらす"));
    }

    #[test]
    fn whitespace_and_punctuation_are_deleted() {
        assert_eq!(normalize("こんにちは 。 、!"), normalize("こんにちは"));
    }

    #[test]
    fn nfkc_equivalent_forms_match_identically() {
        // Fullwidth vs halfwidth digits collapse under NFKC.
        assert_eq!(normalize("1"), normalize("1"));
    }

    #[test]
    fn match_finds_first_hit_and_is_substring_based() {
        let vocab = vec!["ヤタガラス".to_string(), "ストップ".to_string()];
        let (hit, word) = match_vocabulary("おいヤタガラスくん", &vocab).unwrap();
        assert!(hit);
        assert_eq!(word, "ヤタガラス");
    }

    #[test]
    fn strip_vocabulary_leaves_residue() {
        let vocab = vec!["ヤタガラス".to_string()];
        let residue = strip_vocabulary("ヤタガラス天気を教えて", &vocab);
        assert_eq!(residue, normalize("天気を教えて"));
    }

    #[test]
    fn strip_vocabulary_can_leave_zero_residue() {
        let vocab = vec!["ヤタガラス".to_string()];
        let residue = strip_vocabulary("ヤタガラス", &vocab);
        assert!(residue.is_empty());
    }
}
