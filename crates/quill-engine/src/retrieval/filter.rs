use crate::query::ParsedQuery;

/// Post-search predicate over one candidate. Pure and total; every rule
/// must pass, and the first failing rule short-circuits to `false`.
///
/// Tags are deliberately absent here — tag matches boost scores during
/// reranking, they never filter.
pub fn passes_filters(path: &str, content: &str, parsed: &ParsedQuery) -> bool {
    let path_lower = path.to_lowercase();

    if !parsed.extensions.is_empty() {
        // A dot-less path has no extension to match against
        let Some((_, ext)) = path_lower.rsplit_once('.') else {
            return false;
        };
        let matched = parsed
            .extensions
            .iter()
            .any(|wanted| ext == wanted || (!ext.is_empty() && wanted.starts_with(ext)));
        if !matched {
            return false;
        }
    }

    if !parsed.path_includes.is_empty()
        && !parsed.path_includes.iter().any(|p| path_lower.contains(p))
    {
        return false;
    }

    if parsed.path_excludes.iter().any(|p| path_lower.contains(p)) {
        return false;
    }

    if !parsed.exact_terms.is_empty() || !parsed.text_excludes.is_empty() {
        let content_lower = content.to_lowercase();

        if !parsed
            .exact_terms
            .iter()
            .all(|phrase| content_lower.contains(phrase))
        {
            return false;
        }

        if parsed
            .text_excludes
            .iter()
            .any(|word| content_lower.contains(word))
        {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::parse;

    #[test]
    fn test_no_facets_passes_everything() {
        let parsed = parse("plain query");
        assert!(passes_filters("any/path.md", "any content", &parsed));
    }

    #[test]
    fn test_extension_filter() {
        let parsed = parse("ext:md notes");
        assert!(passes_filters("notes/a.md", "x", &parsed));
        assert!(!passes_filters("notes/a.txt", "x", &parsed));
    }

    #[test]
    fn test_extension_prefix_match() {
        // Candidate ".md" matches a queried "mdx" by prefix
        let parsed = parse("ext:mdx notes");
        assert!(passes_filters("notes/a.md", "x", &parsed));
        assert!(!passes_filters("notes/a.txt", "x", &parsed));
    }

    #[test]
    fn test_dotless_path_fails_extension_filter() {
        let parsed = parse("ext:md notes");
        assert!(!passes_filters("notes/README", "x", &parsed));
    }

    #[test]
    fn test_path_include() {
        let parsed = parse("path:projects query");
        assert!(passes_filters("Projects/plan.md", "x", &parsed));
        assert!(!passes_filters("journal/day.md", "x", &parsed));
    }

    #[test]
    fn test_path_exclude() {
        let parsed = parse("-path:archive query");
        assert!(passes_filters("notes/a.md", "x", &parsed));
        assert!(!passes_filters("Archive/old.md", "x", &parsed));
    }

    #[test]
    fn test_exact_terms_conjunctive() {
        let parsed = parse(r#""alpha beta" "gamma" query"#);
        assert!(passes_filters("a.md", "alpha beta and Gamma here", &parsed));
        assert!(!passes_filters("a.md", "only alpha beta here", &parsed));
    }

    #[test]
    fn test_text_exclude() {
        let parsed = parse("-draft query");
        assert!(passes_filters("a.md", "final version", &parsed));
        assert!(!passes_filters("a.md", "this is a DRAFT", &parsed));
    }

    #[test]
    fn test_tags_never_filter() {
        let parsed = parse("#urgent query");
        // No tag in content, still passes: tags boost, they do not filter
        assert!(passes_filters("a.md", "nothing tagged here", &parsed));
    }

    #[test]
    fn test_all_rules_combined() {
        let parsed = parse(r#"ext:md path:notes -path:old "must have" -nope q"#);
        assert!(passes_filters("notes/keep.md", "it must have this", &parsed));
        assert!(!passes_filters("notes/old/keep.md", "it must have this", &parsed));
        assert!(!passes_filters("notes/keep.md", "must have but also nope", &parsed));
    }
}
