//! Brand mention and citation extraction over completion text.
//!
//! [`extract`] is a pure function of its inputs: no network calls and no
//! shared state, so it can run concurrently over many completions and is
//! cheap to test. Matching is sentence-scoped and tolerant of casing and
//! minor morphological variation.

#![deny(missing_docs)]

mod similarity;

use serde::Serialize;

/// Minimum similarity ratio for a fuzzy match to count.
const FUZZY_THRESHOLD: f64 = 0.8;

/// How a brand reference appears in the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CitationKind {
    /// The brand string appears verbatim (ignoring case).
    DirectMention,
    /// A close variation of the brand string.
    Paraphrase,
    /// The mention sits next to a URL-like token.
    Link,
}

/// A detected reference to a monitored brand. Read-only once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    /// Byte offset where the matched span starts.
    pub span_start: usize,
    /// Byte offset one past the end of the matched span.
    pub span_end: usize,
    /// The text of the matched span, as it appears in the input.
    pub matched_text: String,
    /// The brand the span was matched against.
    pub brand_name: String,
    /// Match quality in `0.0..=1.0`. Exact matches score 1.0, fuzzy matches
    /// the similarity ratio.
    pub confidence: f64,
    /// Context-derived kind of the reference.
    pub kind: CitationKind,
}

/// A token inside one sentence, with its absolute byte span.
struct Token<'a> {
    raw: &'a str,
    /// Span of the token with surrounding punctuation trimmed.
    start: usize,
    end: usize,
}

/// Extract brand citations from completion text.
///
/// The text is split into sentences; within each sentence, token windows of
/// each brand's word count are compared case-insensitively against the brand
/// name. Overlapping matches are deduplicated keeping the highest
/// confidence, and the result is ordered by span start.
pub fn extract(text: &str, brand_names: &[String]) -> Vec<Citation> {
    let mut candidates = Vec::new();

    for (sentence_start, sentence) in sentences(text) {
        let tokens = tokenize(sentence, sentence_start);

        for brand in brand_names {
            let brand = brand.trim();
            if brand.is_empty() {
                continue;
            }

            let word_count = brand.split_whitespace().count();
            if word_count == 0 || word_count > tokens.len() {
                continue;
            }

            let brand_lower = normalize(brand);

            for window in tokens.windows(word_count) {
                let Some(citation) = match_window(text, &tokens, window, brand, &brand_lower) else {
                    continue;
                };

                candidates.push(citation);
            }
        }
    }

    dedupe_overlaps(candidates)
}

/// Compare one token window against a brand, producing a candidate citation.
fn match_window(
    text: &str,
    sentence_tokens: &[Token<'_>],
    window: &[Token<'_>],
    brand: &str,
    brand_lower: &str,
) -> Option<Citation> {
    let span_start = window.first()?.start;
    let span_end = window.last()?.end;

    if span_start >= span_end {
        return None;
    }

    let candidate = window.iter().map(|t| &text[t.start..t.end]).collect::<Vec<_>>().join(" ");
    let candidate_lower = normalize(&candidate);

    let (confidence, exact) = if candidate_lower == brand_lower {
        (1.0, true)
    } else {
        let ratio = similarity::ratio(&candidate_lower, brand_lower);
        if ratio < FUZZY_THRESHOLD {
            return None;
        }
        (ratio, false)
    };

    let kind = if has_adjacent_url(sentence_tokens, window) {
        CitationKind::Link
    } else if exact {
        CitationKind::DirectMention
    } else {
        CitationKind::Paraphrase
    };

    Some(Citation {
        span_start,
        span_end,
        matched_text: text[span_start..span_end].to_string(),
        brand_name: brand.to_string(),
        confidence,
        kind,
    })
}

/// Whether the token directly before or after the window looks like a URL.
fn has_adjacent_url(tokens: &[Token<'_>], window: &[Token<'_>]) -> bool {
    let Some(first) = window.first() else {
        return false;
    };
    let Some(last) = window.last() else {
        return false;
    };

    let before = tokens.iter().take_while(|t| t.start < first.start).last();
    let after = tokens.iter().find(|t| t.start > last.start);

    before.is_some_and(|t| is_url_like(t.raw)) || after.is_some_and(|t| is_url_like(t.raw))
}

fn is_url_like(token: &str) -> bool {
    let token = token.trim_matches(|c: char| matches!(c, '(' | ')' | '[' | ']' | '<' | '>' | ',' | '.' | ';'));
    token.contains("://") || token.starts_with("www.")
}

fn normalize(s: &str) -> String {
    s.to_lowercase()
}

/// Split text into sentences, returning each with its absolute byte offset.
fn sentences(text: &str) -> Vec<(usize, &str)> {
    let mut result = Vec::new();
    let mut start = 0;

    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?' | '\n') {
            let end = i + c.len_utf8();
            if !text[start..end].trim().is_empty() {
                result.push((start, &text[start..end]));
            }
            start = end;
        }
    }

    if !text[start..].trim().is_empty() {
        result.push((start, &text[start..]));
    }

    result
}

/// Split a sentence into whitespace-delimited tokens with punctuation-trimmed
/// spans. Tokens that are pure punctuation are dropped.
fn tokenize(sentence: &str, offset: usize) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;

    for raw in sentence.split_whitespace() {
        // split_whitespace loses offsets, so find each token from the cursor.
        let raw_start = match sentence[cursor..].find(raw) {
            Some(pos) => cursor + pos,
            None => continue,
        };
        cursor = raw_start + raw.len();

        let trimmed_front = raw.trim_start_matches(|c: char| !c.is_alphanumeric());
        let leading = raw.len() - trimmed_front.len();
        let core = trimmed_front.trim_end_matches(|c: char| !c.is_alphanumeric());

        if core.is_empty() && !is_url_like(raw) {
            continue;
        }

        let start = offset + raw_start + leading;
        let core_len = if core.is_empty() { raw.len() - leading } else { core.len() };

        tokens.push(Token {
            raw,
            start,
            end: start + core_len,
        });
    }

    tokens
}

/// Drop overlapping citations, keeping the highest confidence. Confidence
/// ties go to the longer span. The survivors are ordered by span start.
fn dedupe_overlaps(mut candidates: Vec<Citation>) -> Vec<Citation> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (b.span_end - b.span_start).cmp(&(a.span_end - a.span_start)))
            .then_with(|| a.span_start.cmp(&b.span_start))
    });

    let mut kept: Vec<Citation> = Vec::new();

    for candidate in candidates {
        let overlaps = kept
            .iter()
            .any(|c| candidate.span_start < c.span_end && c.span_start < candidate.span_end);

        if !overlaps {
            kept.push(candidate);
        }
    }

    kept.sort_by_key(|c| c.span_start);
    kept
}
