use serde::{Deserialize, Serialize};

/// Structured facets extracted from one raw query string.
///
/// Produced by [`parse`]; immutable afterwards. `text` keeps the order the
/// free terms appeared in, every other facet is a de-duplicated list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedQuery {
    /// Free-text terms, lower-cased, in input order.
    pub text: Vec<String>,
    /// Quoted phrases, lower-cased, quotes stripped.
    pub exact_terms: Vec<String>,
    /// `#tag` tokens, hash prefix retained, original case kept.
    pub tags: Vec<String>,
    /// `ext:md` style extension filters, lower-cased.
    pub extensions: Vec<String>,
    /// `path:foo` substrings, lower-cased.
    pub path_includes: Vec<String>,
    /// `-path:bar` substrings, lower-cased.
    pub path_excludes: Vec<String>,
    /// `-word` exclusions, lower-cased.
    pub text_excludes: Vec<String>,
}

impl ParsedQuery {
    /// Free text plus exact phrases joined into one string, the form the
    /// lexical index is queried with.
    pub fn clean_text(&self) -> String {
        let mut parts: Vec<&str> = self.text.iter().map(String::as_str).collect();
        parts.extend(self.exact_terms.iter().map(String::as_str));
        parts.join(" ")
    }

    /// True when any post-search predicate facet is present.
    pub fn has_filters(&self) -> bool {
        !self.extensions.is_empty()
            || !self.path_includes.is_empty()
            || !self.path_excludes.is_empty()
            || !self.exact_terms.is_empty()
            || !self.text_excludes.is_empty()
    }
}

/// Parse a raw query string into structured facets.
///
/// Total: malformed input degrades to free text, never errors. Each
/// extractor strips its matches from a working copy before the next runs,
/// so extraction order is load-bearing — a tag inside a quoted phrase is
/// protected because phrases are pulled first, and `-path:x` must be taken
/// before the generic `-word` rule or it would be consumed as `-path`.
pub fn parse(raw: &str) -> ParsedQuery {
    let mut parsed = ParsedQuery::default();
    let mut working = raw.to_string();

    working = extract_quoted(&working, &mut parsed.exact_terms);
    working = extract_tags(&working, &mut parsed.tags);
    working = extract_prefixed(&working, "ext:", &mut parsed.extensions);
    working = extract_prefixed(&working, "path:", &mut parsed.path_includes);
    working = extract_prefixed(&working, "-path:", &mut parsed.path_excludes);
    working = extract_negations(&working, &mut parsed.text_excludes);

    for token in working.split_whitespace() {
        let token = token.trim().to_lowercase();
        if !token.is_empty() {
            parsed.text.push(token);
        }
    }

    parsed
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

/// Pull out double-quoted spans, lower-cased with quotes stripped.
/// An unpaired quote is left in place and falls through to free text.
fn extract_quoted(input: &str, out: &mut Vec<String>) -> String {
    let mut rest = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        if c != '"' {
            rest.push(c);
            continue;
        }
        // Look for the closing quote
        let tail = &input[start + 1..];
        if let Some(end) = tail.find('"') {
            push_unique(out, tail[..end].trim().to_lowercase());
            // Skip the span including the closing quote
            while let Some(&(i, _)) = chars.peek() {
                if i > start + 1 + end {
                    break;
                }
                chars.next();
            }
            rest.push(' ');
        } else {
            rest.push(c);
        }
    }

    rest
}

/// Pull out `#tag` tokens: a hash, a leading letter, then alnum/`_`/`-`/`/`.
fn extract_tags(input: &str, out: &mut Vec<String>) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut rest = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '#' && i + 1 < chars.len() && chars[i + 1].is_alphabetic() {
            let mut j = i + 1;
            while j < chars.len() && is_tag_char(chars[j]) {
                j += 1;
            }
            let tag: String = chars[i..j].iter().collect();
            push_unique(out, tag);
            rest.push(' ');
            i = j;
        } else {
            rest.push(chars[i]);
            i += 1;
        }
    }

    rest
}

fn is_tag_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '/'
}

/// Pull out `<prefix><token>` occurrences at word boundaries, case-insensitive
/// on the prefix. The boundary requirement keeps `path:` from matching inside
/// `-path:` — the exclusion form starts its own token with the hyphen.
fn extract_prefixed(input: &str, prefix: &str, out: &mut Vec<String>) -> String {
    let bytes = input.as_bytes();
    let mut rest = String::with_capacity(input.len());
    let mut i = 0;

    let has_prefix = |at: usize| {
        at + prefix.len() <= bytes.len()
            && bytes[at..at + prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    };

    while i < input.len() {
        let at_boundary = i == 0 || bytes[i - 1].is_ascii_whitespace();
        if at_boundary && has_prefix(i) {
            let value_start = i + prefix.len();
            let value_end = input[value_start..]
                .find(char::is_whitespace)
                .map(|off| value_start + off)
                .unwrap_or(input.len());
            if value_end > value_start {
                push_unique(out, input[value_start..value_end].to_lowercase());
                rest.push(' ');
                i = value_end;
                continue;
            }
        }
        // Advance one char, preserving multi-byte sequences
        let step = input[i..].chars().next().map(char::len_utf8).unwrap_or(1);
        rest.push_str(&input[i..i + step]);
        i += step;
    }

    rest
}

/// Pull out remaining `-word` exclusions (bare hyphen-prefixed words).
fn extract_negations(input: &str, out: &mut Vec<String>) -> String {
    let mut rest = Vec::new();

    for token in input.split_whitespace() {
        if let Some(word) = token.strip_prefix('-') {
            if !word.is_empty() {
                push_unique(out, word.to_lowercase());
                continue;
            }
        }
        rest.push(token);
    }

    rest.join(" ")
}
