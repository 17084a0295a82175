//! Skill search: substring match with an edit-distance fallback.

use super::types::SkillInfo;

/// Queries shorter than this never use the fuzzy fallback.
pub const FUZZY_MIN_QUERY_LEN: usize = 3;

/// Largest edit distance accepted by the fuzzy fallback.
pub const FUZZY_MAX_DISTANCE: usize = 3;

/// Returns skills whose name or description contains `query`, ignoring case.
///
/// When nothing matches and the query has at least [`FUZZY_MIN_QUERY_LEN`]
/// characters, returns skills whose name is within [`FUZZY_MAX_DISTANCE`]
/// edits of the query, closest first.
#[must_use]
pub fn search(skills: &[SkillInfo], query: &str) -> Vec<SkillInfo> {
    let needle = query.to_lowercase();

    let exact: Vec<SkillInfo> = skills
        .iter()
        .filter(|s| {
            s.name.to_lowercase().contains(&needle)
                || s.description.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect();

    if !exact.is_empty() || needle.chars().count() < FUZZY_MIN_QUERY_LEN {
        return exact;
    }

    let mut fuzzy: Vec<(usize, &SkillInfo)> = skills
        .iter()
        .map(|s| (levenshtein(&s.name.to_lowercase(), &needle), s))
        .filter(|(distance, _)| *distance <= FUZZY_MAX_DISTANCE)
        .collect();
    // Stable sort keeps manifest order among equal distances.
    fuzzy.sort_by_key(|(distance, _)| *distance);
    fuzzy.into_iter().map(|(_, s)| s.clone()).collect()
}

/// Levenshtein distance over chars.
#[must_use]
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution
                .min(previous[j + 1] + 1)
                .min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skill(name: &str, description: &str) -> SkillInfo {
        SkillInfo {
            name: name.to_string(),
            description: description.to_string(),
            version: "1.0.0".to_string(),
            source: "test".to_string(),
            repo: None,
        }
    }

    fn catalog() -> Vec<SkillInfo> {
        vec![
            skill("pdf", "Read and fill PDF forms"),
            skill("docx", "Edit Word documents"),
            skill("canvas-design", "Create visual art"),
            skill("xlsx", "Spreadsheet tooling"),
        ]
    }

    fn names(results: &[SkillInfo]) -> Vec<&str> {
        results.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("docx", "docs"), 1);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
    }

    #[test]
    fn test_substring_matches_name_or_description() {
        assert_eq!(names(&search(&catalog(), "PDF")), vec!["pdf"]);
        assert_eq!(names(&search(&catalog(), "documents")), vec!["docx"]);
        assert_eq!(names(&search(&catalog(), "s")).len(), 4);
    }

    #[test]
    fn test_short_query_never_fuzzy() {
        assert!(search(&catalog(), "zq").is_empty());
    }

    #[test]
    fn test_whitespace_is_part_of_the_query() {
        assert_eq!(names(&search(&catalog(), "   ")), vec!["pdf"]);
    }

    #[test]
    fn test_fuzzy_fallback_orders_by_distance() {
        let results = search(&catalog(), "pdfx");
        assert_eq!(names(&results), vec!["pdf", "docx", "xlsx"]);
    }

    #[test]
    fn test_fuzzy_respects_max_distance() {
        assert!(search(&catalog(), "zzzzzzzz").is_empty());
    }

    #[test]
    fn test_substring_then_typo() {
        assert_eq!(names(&search(&catalog(), "word")), vec!["docx"]);
        assert_eq!(names(&search(&catalog(), "docs")), vec!["docx"]);
    }
}
