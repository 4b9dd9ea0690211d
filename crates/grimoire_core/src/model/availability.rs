//! Availability calculation over translation variants.
//!
//! # Invariants
//! - Output is strictly ascending by language code and duplicate-free.
//! - Only active (`deleted_at == None`) variants are listed.
//! - Total over any input, including empty.

use crate::model::language::LanguageCode;
use crate::model::variant::TranslationVariant;

/// Returns the requestable languages of a variant set in ascending order.
pub fn compute_available<'a, I>(variants: I) -> Vec<LanguageCode>
where
    I: IntoIterator<Item = (&'a LanguageCode, &'a TranslationVariant)>,
{
    let mut languages: Vec<LanguageCode> = variants
        .into_iter()
        .filter(|(_, variant)| variant.is_active())
        .map(|(language, _)| language.clone())
        .collect();
    languages.sort();
    languages.dedup();
    languages
}

/// Counts active variants.
pub fn count_active<'a, I>(variants: I) -> usize
where
    I: IntoIterator<Item = (&'a LanguageCode, &'a TranslationVariant)>,
{
    compute_available(variants).len()
}

#[cfg(test)]
mod tests {
    use super::{compute_available, count_active};
    use crate::model::language::LanguageCode;
    use crate::model::variant::{TranslationVariant, VariantContent};
    use std::collections::BTreeMap;

    fn lang(code: &str) -> LanguageCode {
        LanguageCode::parse(code).unwrap()
    }

    fn entry(code: &str, deleted_at: Option<i64>) -> (LanguageCode, TranslationVariant) {
        let mut variant =
            TranslationVariant::new(lang(code), VariantContent::named(code), false, 1);
        variant.deleted_at = deleted_at;
        (lang(code), variant)
    }

    #[test]
    fn empty_input_yields_empty_list() {
        let variants: BTreeMap<LanguageCode, TranslationVariant> = BTreeMap::new();
        assert!(compute_available(&variants).is_empty());
        assert_eq!(count_active(&variants), 0);
    }

    #[test]
    fn skips_deleted_and_sorts_regardless_of_input_order() {
        let entries = vec![
            entry("fr", None),
            entry("de", Some(5)),
            entry("en", None),
            entry("es", None),
        ];
        let available = compute_available(entries.iter().map(|(k, v)| (k, v)));
        assert_eq!(available, vec![lang("en"), lang("es"), lang("fr")]);
    }

    #[test]
    fn duplicate_entries_are_collapsed() {
        let entries = vec![entry("en", None), entry("en", None)];
        let available = compute_available(entries.iter().map(|(k, v)| (k, v)));
        assert_eq!(available, vec![lang("en")]);
    }

    #[test]
    fn output_matches_active_set_for_every_deletion_pattern() {
        let codes = ["de", "en", "es", "fr", "it"];
        for mask in 0u32..(1 << codes.len()) {
            let variants: BTreeMap<LanguageCode, TranslationVariant> = codes
                .iter()
                .enumerate()
                .map(|(i, code)| entry(code, (mask & (1 << i) != 0).then_some(1)))
                .collect();

            let available = compute_available(&variants);
            assert!(available.windows(2).all(|pair| pair[0] < pair[1]));

            let expected: Vec<LanguageCode> = variants
                .iter()
                .filter(|(_, v)| v.deleted_at.is_none())
                .map(|(k, _)| k.clone())
                .collect();
            assert_eq!(available, expected);
        }
    }
}
