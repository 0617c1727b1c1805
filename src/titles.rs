//! Job-title abbreviation index used to widen title filters.
//!
//! The table is process-wide immutable state built once on first use. Nothing
//! outside this module sees the map itself; callers only get the expansion
//! function, which returns the union of the literal terms, their known
//! abbreviation/long-form counterparts, and partial matches caught by the
//! third tier below.

use once_cell::sync::Lazy;
use regex::Regex;

/// One abbreviation/expansion pair plus a precompiled whole-word matcher for
/// the abbreviation.
struct TitlePair {
    abbreviation: &'static str,
    expansion: &'static str,
    word_matcher: Regex,
}

const TITLE_TABLE: &[(&str, &str)] = &[
    ("CEO", "Chief Executive Officer"),
    ("CTO", "Chief Technology Officer"),
    ("CFO", "Chief Financial Officer"),
    ("COO", "Chief Operating Officer"),
    ("CMO", "Chief Marketing Officer"),
    ("CIO", "Chief Information Officer"),
    ("CHRO", "Chief Human Resources Officer"),
    ("CPO", "Chief Product Officer"),
    ("CRO", "Chief Revenue Officer"),
    ("VP", "Vice President"),
    ("SVP", "Senior Vice President"),
    ("EVP", "Executive Vice President"),
    ("AVP", "Assistant Vice President"),
    ("GM", "General Manager"),
    ("MD", "Managing Director"),
    ("HR", "Human Resources"),
    ("PM", "Product Manager"),
    ("SE", "Software Engineer"),
    ("SDE", "Software Development Engineer"),
    ("SDR", "Sales Development Representative"),
    ("BDR", "Business Development Representative"),
    ("AE", "Account Executive"),
    ("CSM", "Customer Success Manager"),
];

static TITLE_PAIRS: Lazy<Vec<TitlePair>> = Lazy::new(|| {
    TITLE_TABLE
        .iter()
        .map(|&(abbreviation, expansion)| TitlePair {
            abbreviation,
            expansion,
            word_matcher: Regex::new(&format!(r"(?i)\b{}\b", regex::escape(abbreviation)))
                .expect("static abbreviation pattern"),
        })
        .collect()
});

/// Widen a list of user-supplied title terms with known abbreviations and
/// long forms. Order-independent union; duplicates collapse case-insensitively
/// while the first-seen spelling is kept.
pub fn expand_titles(terms: &[String]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::with_capacity(terms.len() * 2);

    for term in terms {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }

        push_unique(&mut expanded, term);

        for pair in TITLE_PAIRS.iter() {
            // Exact abbreviation or exact long form.
            if term.eq_ignore_ascii_case(pair.abbreviation) {
                push_unique(&mut expanded, pair.expansion);
                continue;
            }
            if term.eq_ignore_ascii_case(pair.expansion) {
                push_unique(&mut expanded, pair.abbreviation);
                continue;
            }

            // Third tier: partial/informal phrasings. The length guard keeps
            // one-letter inputs from touching every abbreviation.
            let whole_word = pair.word_matcher.is_match(term);
            let long_form_inside = pair.expansion.contains(' ')
                && term.to_lowercase().contains(&pair.expansion.to_lowercase());
            let prefix_of_abbreviation = term.len() >= 2
                && term.len() <= pair.abbreviation.len()
                && pair
                    .abbreviation
                    .to_lowercase()
                    .starts_with(&term.to_lowercase());

            if whole_word || long_form_inside || prefix_of_abbreviation {
                push_unique(&mut expanded, pair.abbreviation);
                push_unique(&mut expanded, pair.expansion);
            }
        }
    }

    expanded
}

fn push_unique(list: &mut Vec<String>, candidate: &str) {
    if !list.iter().any(|seen| seen.eq_ignore_ascii_case(candidate)) {
        list.push(candidate.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(terms: &[&str]) -> Vec<String> {
        expand_titles(&terms.iter().map(|t| t.to_string()).collect::<Vec<_>>())
    }

    fn contains(set: &[String], needle: &str) -> bool {
        set.iter().any(|s| s.eq_ignore_ascii_case(needle))
    }

    #[test]
    fn abbreviation_expands_to_long_form() {
        let set = expand(&["CEO"]);
        assert!(contains(&set, "CEO"));
        assert!(contains(&set, "Chief Executive Officer"));
    }

    #[test]
    fn long_form_expands_to_abbreviation() {
        let set = expand(&["Chief Executive Officer"]);
        assert!(contains(&set, "CEO"));
        assert!(contains(&set, "Chief Executive Officer"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let set = expand(&["ceo"]);
        assert!(contains(&set, "Chief Executive Officer"));
    }

    #[test]
    fn whole_word_abbreviation_in_phrase() {
        let set = expand(&["VP of Sales"]);
        assert!(contains(&set, "VP"));
        assert!(contains(&set, "Vice President"));
    }

    #[test]
    fn long_form_substring_in_phrase() {
        let set = expand(&["Senior Vice President of Engineering"]);
        assert!(contains(&set, "SVP"));
        assert!(contains(&set, "Senior Vice President"));
        // "Vice President" also sits inside the phrase.
        assert!(contains(&set, "VP"));
    }

    #[test]
    fn short_prefix_touches_abbreviation() {
        let set = expand(&["CH"]);
        assert!(contains(&set, "CHRO"));
        assert!(contains(&set, "Chief Human Resources Officer"));
    }

    #[test]
    fn single_letter_input_does_not_over_match() {
        let set = expand(&["C"]);
        assert_eq!(set, vec!["C".to_string()]);
    }

    #[test]
    fn unknown_terms_pass_through() {
        let set = expand(&["Underwriter"]);
        assert_eq!(set, vec!["Underwriter".to_string()]);
    }

    #[test]
    fn duplicates_collapse_across_inputs() {
        let set = expand(&["VP", "Vice President"]);
        let vp_count = set.iter().filter(|s| s.eq_ignore_ascii_case("VP")).count();
        assert_eq!(vp_count, 1);
    }
}
