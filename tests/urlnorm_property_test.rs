//! Property tests for cache-key stability of the URL normalizer.

use proptest::prelude::*;
use webaudit::urlnorm::NormalizedUrl;

fn query_pairs() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("[a-z]{1,4}", "[a-z0-9]{0,4}"), 1..6)
}

fn url_with(pairs: &[(String, String)]) -> String {
    let query = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("https://example.com/page?{query}")
}

proptest! {
    /// Any two orderings of the same query parameters produce the same key.
    #[test]
    fn key_is_query_order_insensitive(
        (original, shuffled) in query_pairs()
            .prop_flat_map(|pairs| (Just(pairs.clone()), Just(pairs).prop_shuffle()))
    ) {
        let a = NormalizedUrl::parse(&url_with(&original))
            .expect("generated URL must be valid");
        let b = NormalizedUrl::parse(&url_with(&shuffled))
            .expect("generated URL must be valid");
        prop_assert_eq!(a.key(), b.key());
    }

    /// Normalization is a fixed point: re-parsing a key yields the same key.
    #[test]
    fn normalization_is_idempotent(pairs in query_pairs()) {
        let first = NormalizedUrl::parse(&url_with(&pairs))
            .expect("generated URL must be valid");
        let second = NormalizedUrl::parse(first.key())
            .expect("a canonical key must re-parse");
        prop_assert_eq!(first.key(), second.key());
    }

    /// Host casing never changes the key.
    #[test]
    fn key_is_host_case_insensitive(host in "[a-zA-Z]{3,12}") {
        let upper = NormalizedUrl::parse(&format!("https://{}.com/x", host.to_uppercase()))
            .expect("generated URL must be valid");
        let lower = NormalizedUrl::parse(&format!("https://{}.com/x", host.to_lowercase()))
            .expect("generated URL must be valid");
        prop_assert_eq!(upper.key(), lower.key());
    }
}
