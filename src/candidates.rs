//! Generates ordered candidate addresses from a person's name and domain.
//!
//! This stage is pure: no I/O, deterministic output for a given input, and
//! stable ordering. The verifier probes candidates in exactly the order
//! produced here and stops at the first accepted address.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::core::models::{CandidateAddress, EmailPattern};

/// Splits a display name into tokens on whitespace and common punctuation.
static NAME_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s,/]+").expect("Name separator pattern failed to compile. This is a bug."));

/// Produces the candidate addresses for `full_name` at `domain`, most
/// likely pattern first.
///
/// The first and last whitespace-separated tokens of the name are used;
/// middle names are ignored. A single-token name yields the best-effort
/// `token@domain` candidate only. Returns an empty list when no usable
/// tokens remain after normalization.
pub fn generate(full_name: &str, domain: &str) -> Vec<CandidateAddress> {
    let domain = domain.trim().trim_end_matches('.').to_lowercase();
    if domain.is_empty() {
        return Vec::new();
    }

    let tokens: Vec<String> = NAME_SEPARATORS
        .split(full_name)
        .map(normalize_token)
        .filter(|t| !t.is_empty())
        .collect();

    let (first, last) = match tokens.as_slice() {
        [] => return Vec::new(),
        [only] => (only.clone(), None),
        [first, .., last] => (first.clone(), Some(last.clone())),
    };

    let mut candidates = Vec::with_capacity(10);
    let mut seen: HashSet<String> = HashSet::new();
    let mut push = |local: String, pattern: EmailPattern| {
        if seen.insert(local.clone()) {
            let address = format!("{local}@{domain}");
            candidates.push(CandidateAddress {
                local_part: local,
                address,
                pattern,
            });
        }
    };

    let Some(last) = last else {
        push(first, EmailPattern::First);
        return candidates;
    };
    let initial = &first[..1];

    push(first.clone(), EmailPattern::First);
    push(format!("{first}.{last}"), EmailPattern::FirstDotLast);
    push(format!("{initial}{last}"), EmailPattern::InitialLast);
    push(format!("{initial}.{last}"), EmailPattern::InitialDotLast);
    push(last.clone(), EmailPattern::Last);
    push(format!("{first}{last}"), EmailPattern::FirstLast);
    push(format!("{last}{first}"), EmailPattern::LastFirst);
    push(format!("{last}.{first}"), EmailPattern::LastDotFirst);
    push(format!("{first}_{last}"), EmailPattern::FirstUnderscoreLast);
    push(format!("{first}-{last}"), EmailPattern::FirstHyphenLast);

    candidates
}

/// Lower-cases a name token, folds diacritics to their base ASCII letters,
/// and strips everything that is not an ASCII alphanumeric.
fn normalize_token(token: &str) -> String {
    token
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_token_name_yields_ten_ordered_candidates() {
        let candidates = generate("Jane Doe", "example.com");
        let addresses: Vec<&str> = candidates.iter().map(|c| c.address.as_str()).collect();
        assert_eq!(
            addresses,
            vec![
                "jane@example.com",
                "jane.doe@example.com",
                "jdoe@example.com",
                "j.doe@example.com",
                "doe@example.com",
                "janedoe@example.com",
                "doejane@example.com",
                "doe.jane@example.com",
                "jane_doe@example.com",
                "jane-doe@example.com",
            ]
        );
        assert_eq!(candidates[0].pattern, EmailPattern::First);
        assert_eq!(candidates[9].pattern, EmailPattern::FirstHyphenLast);
    }

    #[test]
    fn generation_is_idempotent() {
        let a = generate("Jane Doe", "example.com");
        let b = generate("Jane Doe", "example.com");
        assert_eq!(a, b);
    }

    #[test]
    fn middle_names_are_ignored() {
        let candidates = generate("Jane Alexandra Doe", "example.com");
        assert_eq!(candidates[1].address, "jane.doe@example.com");
    }

    #[test]
    fn coinciding_tokens_produce_no_duplicates() {
        let candidates = generate("John John", "example.com");
        let mut seen = HashSet::new();
        for candidate in &candidates {
            assert!(seen.insert(candidate.address.clone()), "duplicate: {}", candidate.address);
        }
        assert_eq!(candidates[0].address, "john@example.com");
        assert!(candidates.len() < 10);
    }

    #[test]
    fn diacritics_fold_to_ascii() {
        let candidates = generate("José Núñez", "example.com");
        assert_eq!(candidates[1].address, "jose.nunez@example.com");
    }

    #[test]
    fn punctuation_in_names_is_scrubbed() {
        let candidates = generate("Anne-Marie O'Brien", "example.com");
        assert_eq!(candidates[1].address, "annemarie.obrien@example.com");
    }

    #[test]
    fn single_token_falls_back_to_one_candidate() {
        let candidates = generate("Cher", "example.com");
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].address, "cher@example.com");
        assert_eq!(candidates[0].pattern, EmailPattern::First);
    }

    #[test]
    fn empty_inputs_yield_nothing() {
        assert!(generate("", "example.com").is_empty());
        assert!(generate("Jane Doe", "").is_empty());
        assert!(generate("---", "example.com").is_empty());
    }

    #[test]
    fn domain_is_lowercased_and_trimmed() {
        let candidates = generate("Jane Doe", " Example.COM. ");
        assert_eq!(candidates[0].address, "jane@example.com");
    }
}
