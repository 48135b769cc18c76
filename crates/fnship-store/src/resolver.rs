//! Digest-prefix resolution for rollbacks.
//!
//! A prefix selects every stored key whose digest starts with it. One match
//! is used as-is. Several matches need the upload time to disambiguate; the
//! error lists the candidates so the operator can retry with `--time`.

use fnship_core::ArtifactKey;

use crate::error::ResolveError;

pub fn resolve<'a, I>(keys: I, prefix: &str, time: Option<i64>) -> Result<ArtifactKey, ResolveError>
where
    I: IntoIterator<Item = &'a ArtifactKey>,
{
    let prefix = prefix.to_ascii_lowercase();
    let mut matches: Vec<&ArtifactKey> = keys
        .into_iter()
        .filter(|key| key.digest.starts_with(&prefix))
        .collect();
    matches.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

    match matches.as_slice() {
        [] => Err(ResolveError::NoVersionFound { prefix }),
        [only] => Ok((*only).clone()),
        _ => {
            let Some(time) = time else {
                return Err(ResolveError::Ambiguous {
                    prefix,
                    candidates: matches.into_iter().cloned().collect(),
                });
            };
            let at_time: Vec<&ArtifactKey> = matches
                .into_iter()
                .filter(|key| key.timestamp == time)
                .collect();
            match at_time.as_slice() {
                [] => Err(ResolveError::NoVersionFound { prefix }),
                [only] => Ok((*only).clone()),
                _ => Err(ResolveError::Ambiguous {
                    prefix,
                    candidates: at_time.into_iter().cloned().collect(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(raw: &[&str]) -> Vec<ArtifactKey> {
        raw.iter().map(|k| ArtifactKey::parse(k).unwrap()).collect()
    }

    fn sample() -> Vec<ArtifactKey> {
        keys(&["1700-abc123.zip", "1800-abc999.zip", "1900-abcfff.zip"])
    }

    #[test]
    fn test_ambiguous_prefix_lists_all_candidates() {
        let err = resolve(&sample(), "abc", None).unwrap_err();
        match &err {
            ResolveError::Ambiguous { candidates, .. } => assert_eq!(candidates.len(), 3),
            other => panic!("expected ambiguity, got {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("multiple versions found"));
        for (time, digest) in [("1700", "abc123"), ("1800", "abc999"), ("1900", "abcfff")] {
            assert!(message.contains(&format!("time: {time}\tsha256: {digest}")), "{message}");
        }
    }

    #[test]
    fn test_time_disambiguates() {
        let key = resolve(&sample(), "abc", Some(1800)).unwrap();
        assert_eq!(key.to_string(), "1800-abc999.zip");
    }

    #[test]
    fn test_longer_prefix_is_unambiguous() {
        let key = resolve(&sample(), "abcf", None).unwrap();
        assert_eq!(key.to_string(), "1900-abcfff.zip");
    }

    #[test]
    fn test_prefix_is_case_insensitive() {
        let key = resolve(&sample(), "ABCF", None).unwrap();
        assert_eq!(key.timestamp, 1900);
    }

    #[test]
    fn test_no_match() {
        let err = resolve(&sample(), "def", None).unwrap_err();
        assert_eq!(err, ResolveError::NoVersionFound { prefix: "def".into() });
    }

    #[test]
    fn test_time_without_exact_match() {
        let err = resolve(&sample(), "abc", Some(1750)).unwrap_err();
        assert!(matches!(err, ResolveError::NoVersionFound { .. }));
    }

    #[test]
    fn test_single_match_ignores_time() {
        let key = resolve(&sample(), "abc1", Some(42)).unwrap();
        assert_eq!(key.timestamp, 1700);
    }

    #[test]
    fn test_same_second_uploads_stay_ambiguous() {
        let stored = keys(&["1700-abc1.zip", "1700-abc2.zip", "1800-abc3.zip"]);
        let err = resolve(&stored, "abc", Some(1700)).unwrap_err();
        match err {
            ResolveError::Ambiguous { candidates, .. } => {
                assert_eq!(candidates, keys(&["1700-abc1.zip", "1700-abc2.zip"]));
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }
}
