use std::collections::HashSet;

/// Pluggable CJK sub-word segmentation backend.
///
/// The tokenizer hands every CJK token through this seam; a search-mode
/// segmenter should return maximal sub-word coverage. [`NoopSegmenter`] is
/// the default and passes tokens through unchanged, so single CJK characters
/// remain their own tokens when no backend is wired in.
pub trait CjkSegmenter: Send + Sync {
    fn segment(&self, text: &str) -> Vec<String>;
}

/// Identity segmentation, used when no CJK backend is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSegmenter;

impl CjkSegmenter for NoopSegmenter {
    fn segment(&self, text: &str) -> Vec<String> {
        vec![text.to_string()]
    }
}

/// CJK Unified Ideographs block.
pub fn is_cjk(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

/// Tokenize text for indexing and querying.
///
/// Base scan: a CJK character flushes the pending run and becomes its own
/// one-character token; whitespace flushes without emitting; everything else
/// accumulates. CJK tokens are then re-segmented through `segmenter`, and
/// each token is expanded: diacritic-folded + lower-cased, camelCase parts
/// (non-CJK, length >= 3, at least two parts), and hyphen parts (non-CJK).
/// The result is de-duplicated; order is not significant.
pub fn tokenize(text: &str, segmenter: &dyn CjkSegmenter) -> Vec<String> {
    let mut base: Vec<String> = Vec::new();
    let mut run = String::new();

    for c in text.chars() {
        if is_cjk(c) {
            if !run.is_empty() {
                base.push(std::mem::take(&mut run));
            }
            base.push(c.to_string());
        } else if c.is_whitespace() {
            if !run.is_empty() {
                base.push(std::mem::take(&mut run));
            }
        } else {
            run.push(c);
        }
    }
    if !run.is_empty() {
        base.push(run);
    }

    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    let mut emit = |t: String| {
        if !t.is_empty() && seen.insert(t.clone()) {
            tokens.push(t);
        }
    };

    for token in base {
        let contains_cjk = token.chars().any(is_cjk);
        let parts = if contains_cjk {
            segmenter.segment(&token)
        } else {
            vec![token]
        };

        for part in parts {
            emit(fold_lower(&part));

            let part_is_cjk = part.chars().any(is_cjk);
            if !part_is_cjk && part.chars().count() >= 3 {
                let camel = split_camel(&part);
                if camel.len() >= 2 {
                    for piece in camel {
                        emit(fold_lower(&piece));
                    }
                }
            }
            if !part_is_cjk && part.contains('-') {
                for piece in part.split('-') {
                    emit(fold_lower(piece));
                }
            }
        }
    }

    tokens
}

/// Split at lowercase-to-uppercase transitions: `camelCaseWord` ->
/// [camel, Case, Word]. All-caps runs stay whole.
fn split_camel(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();

    for pair in chars.windows(2) {
        current.push(pair[0]);
        if pair[0].is_lowercase() && pair[1].is_uppercase() {
            parts.push(std::mem::take(&mut current));
        }
    }
    if let Some(&last) = chars.last() {
        current.push(last);
    }
    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

/// Diacritic-fold and lower-case a token.
pub fn fold_lower(token: &str) -> String {
    token.chars().flat_map(fold_char).collect()
}

/// Map one character to its folded, lower-cased form. Covers the Latin-1
/// supplement and the common Latin Extended-A letters; everything else is
/// passed through `to_lowercase`.
fn fold_char(c: char) -> Vec<char> {
    let folded: &str = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'ā' | 'ă'
        | 'ą' | 'Ā' | 'Ă' | 'Ą' => "a",
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' | 'Ē'
        | 'Ĕ' | 'Ė' | 'Ę' | 'Ě' => "e",
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' | 'Ĩ'
        | 'Ī' | 'Ĭ' | 'Į' | 'İ' => "i",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'ō' | 'ŏ'
        | 'ő' | 'Ō' | 'Ŏ' | 'Ő' => "o",
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų'
        | 'Ũ' | 'Ū' | 'Ŭ' | 'Ů' | 'Ű' | 'Ų' => "u",
        'ç' | 'Ç' | 'ć' | 'ĉ' | 'ċ' | 'č' | 'Ć' | 'Ĉ' | 'Ċ' | 'Č' => "c",
        'ñ' | 'Ñ' | 'ń' | 'ņ' | 'ň' | 'Ń' | 'Ņ' | 'Ň' => "n",
        'ý' | 'ÿ' | 'Ý' | 'ŷ' | 'Ŷ' | 'Ÿ' => "y",
        'ß' => "ss",
        'æ' | 'Æ' => "ae",
        'œ' | 'Œ' => "oe",
        'ð' | 'Ð' => "d",
        'þ' | 'Þ' => "th",
        'ś' | 'ŝ' | 'ş' | 'š' | 'Ś' | 'Ŝ' | 'Ş' | 'Š' => "s",
        'ź' | 'ż' | 'ž' | 'Ź' | 'Ż' | 'Ž' => "z",
        'ł' | 'Ł' => "l",
        'ğ' | 'Ğ' | 'ĝ' | 'Ĝ' => "g",
        'ŕ' | 'ř' | 'Ŕ' | 'Ř' => "r",
        'ť' | 'ţ' | 'Ť' | 'Ţ' => "t",
        'đ' | 'Đ' => "d",
        _ => return c.to_lowercase().collect(),
    };
    folded.chars().collect()
}
