//! Markdown note parsing: frontmatter, headings, tags, wiki-links, urls,
//! and heading/paragraph-aware chunking.

use std::collections::HashMap;

/// Soft chunk size; a chunk closes at the next paragraph boundary once
/// this many characters have accumulated.
const CHUNK_TARGET: usize = 1000;

/// Everything extracted from one markdown file.
#[derive(Debug, Default)]
pub struct ParsedNote {
    pub frontmatter: HashMap<String, String>,
    pub aliases: Vec<String>,
    pub frontmatter_tags: Vec<String>,
    pub h1: Vec<String>,
    pub h2: Vec<String>,
    pub h3: Vec<String>,
    pub inline_tags: Vec<String>,
    pub links: Vec<String>,
    pub urls: Vec<String>,
    pub chunks: Vec<String>,
}

impl ParsedNote {
    /// Frontmatter tags and inline `#tags`, deduplicated, hash prefix kept.
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();
        for tag in self.frontmatter_tags.iter().chain(self.inline_tags.iter()) {
            let tag = if tag.starts_with('#') {
                tag.clone()
            } else {
                format!("#{tag}")
            };
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }
}

/// Parse one markdown file's content.
pub fn parse_note(content: &str) -> ParsedNote {
    let mut note = ParsedNote::default();

    let body = strip_frontmatter(content, &mut note);

    let mut in_code_block = false;
    for line in body.lines() {
        if line.trim_start().starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }

        if let Some(rest) = line.strip_prefix("# ") {
            note.h1.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("## ") {
            note.h2.push(rest.trim().to_string());
        } else if let Some(rest) = line.strip_prefix("### ") {
            note.h3.push(rest.trim().to_string());
        }

        extract_inline_tags(line, &mut note.inline_tags);
        extract_wiki_links(line, &mut note.links);
        extract_urls(line, &mut note.urls);
    }

    note.chunks = chunk_body(body);
    note
}

/// Split off a leading `---` frontmatter block, collecting simple
/// `key: value` pairs plus aliases and tags. Returns the remaining body.
fn strip_frontmatter<'a>(content: &'a str, note: &mut ParsedNote) -> &'a str {
    let Some(rest) = content.strip_prefix("---\n") else {
        return content;
    };
    let Some(end) = rest.find("\n---") else {
        return content;
    };

    let block = &rest[..end];
    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        match key.as_str() {
            "aliases" | "alias" => note.aliases = parse_list_value(value),
            "tags" | "tag" => note.frontmatter_tags = parse_list_value(value),
            _ => {
                if !value.is_empty() {
                    note.frontmatter.insert(key, value.to_string());
                }
            }
        }
    }

    let body_at = end + "\n---".len();
    rest[body_at..].trim_start_matches('\n')
}

/// Parse `[a, b]` or comma-separated frontmatter list values.
fn parse_list_value(value: &str) -> Vec<String> {
    value
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Collect `#tag` tokens: a hash followed by a letter, then letters,
/// digits, `_`, `-`, or `/`.
fn extract_inline_tags(line: &str, out: &mut Vec<String>) {
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#'
            && i + 1 < bytes.len()
            && bytes[i + 1].is_ascii_alphabetic()
            // Not part of a word (e.g. "c#5") or a heading marker
            && (i == 0 || bytes[i - 1].is_ascii_whitespace())
        {
            let start = i;
            i += 1;
            while i < bytes.len()
                && (bytes[i].is_ascii_alphanumeric() || matches!(bytes[i], b'_' | b'-' | b'/'))
            {
                i += 1;
            }
            let tag = line[start..i].to_string();
            if !out.contains(&tag) {
                out.push(tag);
            }
        } else {
            i += 1;
        }
    }
}

/// Collect `[[target]]` and `[[target|alias]]` wiki-link targets.
fn extract_wiki_links(line: &str, out: &mut Vec<String>) {
    let mut rest = line;
    while let Some(start) = rest.find("[[") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("]]") else {
            return;
        };
        let inner = &after[..end];
        let target = inner.split('|').next().unwrap_or(inner).trim();
        if !target.is_empty() && !out.iter().any(|l| l == target) {
            out.push(target.to_string());
        }
        rest = &after[end + 2..];
    }
}

/// Collect http/https URLs, trimming trailing punctuation.
fn extract_urls(line: &str, out: &mut Vec<String>) {
    for word in line.split_whitespace() {
        let word = word.trim_start_matches(['(', '[', '<']);
        if word.starts_with("http://") || word.starts_with("https://") {
            let url = word
                .trim_end_matches([')', ']', '>', '.', ',', ';', '!', '?'])
                .to_string();
            if !out.contains(&url) {
                out.push(url);
            }
        }
    }
}

/// Split a body into chunks at headings and paragraph boundaries, closing
/// a chunk once it passes [`CHUNK_TARGET`] characters.
fn chunk_body(body: &str) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    let mut flush = |current: &mut String, chunks: &mut Vec<String>| {
        let trimmed = current.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }
        current.clear();
    };

    for paragraph in body.split("\n\n") {
        let is_heading = paragraph.trim_start().starts_with('#');
        if is_heading || current.len() >= CHUNK_TARGET {
            flush(&mut current, &mut chunks);
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }
    flush(&mut current, &mut chunks);

    chunks
}
