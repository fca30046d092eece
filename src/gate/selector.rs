use crate::platform::model::BuildName;

/// Picks the "latest" build as the greatest name under plain string
/// ordering, or None for an empty set. This is the platform's observable
/// contract, kept as is: numeric suffixes compare as text, so
/// "frontend-9" sorts after "frontend-10". Swapping in a numeric or
/// timestamp aware strategy only touches this function.
pub fn select_latest<'a, I>(names: I) -> Option<&'a BuildName>
where
    I: IntoIterator<Item = &'a BuildName>,
{
    names.into_iter().max()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(raw: &[&str]) -> Vec<BuildName> {
        raw.iter().copied().map(BuildName::from).collect()
    }

    #[test]
    fn picks_the_unique_lexicographic_maximum() {
        let builds = names(&["frontend-1", "frontend-3", "frontend-2"]);
        assert_eq!(select_latest(&builds).unwrap().as_str(), "frontend-3");
    }

    #[test]
    fn empty_set_selects_nothing() {
        let builds: Vec<BuildName> = Vec::new();
        assert!(select_latest(&builds).is_none());
    }

    #[test]
    fn single_build_is_its_own_latest() {
        let builds = names(&["frontend-1"]);
        assert_eq!(select_latest(&builds).unwrap().as_str(), "frontend-1");
    }

    #[test]
    fn numeric_suffixes_compare_as_text() {
        // "frontend-9" > "frontend-10" under string ordering. Documented
        // selection policy, not a bug to fix here.
        let builds = names(&["frontend-10", "frontend-9"]);
        assert_eq!(select_latest(&builds).unwrap().as_str(), "frontend-9");
    }
}
