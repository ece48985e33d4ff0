//! Community-name extraction against the known registry.
//!
//! Exact matching works on normalized token runs (a slug's tokens appearing
//! consecutively in the question); fuzzy matching tolerates small typos via
//! per-token edit distance. Capitalized non-initial words that resolve to
//! nothing are reported back as candidate unknown communities so the caller
//! can answer "no data for X" instead of guessing.

#[derive(Debug, Clone, Default)]
pub struct NameMatches {
    /// Registry slugs, hints first, then question mentions in order.
    pub resolved: Vec<String>,
    /// Name-like phrases that matched nothing in the registry.
    pub unresolved: Vec<String>,
}

pub fn extract_communities(
    question: &str,
    hints: &[String],
    registry: &[String],
    fuzzy_max_edits: usize,
) -> NameMatches {
    let q_tokens = normalize_tokens(question);
    let mut out = NameMatches::default();

    for hint in hints {
        let hint_tokens = normalize_tokens(hint);
        if hint_tokens.is_empty() {
            continue;
        }
        match registry
            .iter()
            .find(|slug| tokens_match(&slug_tokens(slug), &hint_tokens, fuzzy_max_edits))
        {
            Some(slug) => push_unique(&mut out.resolved, slug.clone()),
            None => push_unique(&mut out.unresolved, hint.trim().to_string()),
        }
    }

    // Question mentions, ordered by first match position.
    let mut found: Vec<(usize, String)> = Vec::new();
    for slug in registry {
        let st = slug_tokens(slug);
        if let Some(pos) = find_run(&q_tokens, &st, fuzzy_max_edits) {
            found.push((pos, slug.clone()));
        }
    }
    found.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    for (_, slug) in found {
        push_unique(&mut out.resolved, slug);
    }

    for phrase in capitalized_phrases(question) {
        let pt = normalize_tokens(&phrase);
        if pt.is_empty() {
            continue;
        }
        let known = registry
            .iter()
            .any(|slug| find_run(&pt, &slug_tokens(slug), fuzzy_max_edits).is_some()
                || find_run(&slug_tokens(slug), &pt, fuzzy_max_edits).is_some());
        if !known {
            push_unique(&mut out.unresolved, phrase);
        }
    }

    out
}

fn push_unique(v: &mut Vec<String>, s: String) {
    if !v.contains(&s) {
        v.push(s);
    }
}

pub(crate) fn normalize_tokens(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

fn slug_tokens(slug: &str) -> Vec<String> {
    normalize_tokens(slug)
}

/// Do `needle` tokens appear as a contiguous run in `haystack`? Returns the
/// start index of the earliest run.
fn find_run(haystack: &[String], needle: &[String], max_edits: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    (0..=haystack.len() - needle.len()).find(|&start| {
        needle
            .iter()
            .zip(&haystack[start..])
            .all(|(n, h)| token_matches(h, n, max_edits))
    })
}

fn tokens_match(slug: &[String], candidate: &[String], max_edits: usize) -> bool {
    slug.len() == candidate.len()
        && slug
            .iter()
            .zip(candidate)
            .all(|(s, c)| token_matches(c, s, max_edits))
}

/// Exact for short tokens; short tokens collide too easily under edit
/// distance, so fuzziness only applies from four characters up.
fn token_matches(question_token: &str, slug_token: &str, max_edits: usize) -> bool {
    if question_token == slug_token {
        return true;
    }
    if max_edits == 0 || slug_token.len() < 4 {
        return false;
    }
    levenshtein(question_token, slug_token) <= max_edits
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let sub = prev[j] + usize::from(ca != cb);
            cur[j + 1] = sub.min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

/// Consecutive capitalized words, excluding the question's opening word
/// (which is capitalized by grammar, not by being a name).
fn capitalized_phrases(question: &str) -> Vec<String> {
    let words: Vec<&str> = question.split_whitespace().collect();
    let mut phrases = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for (i, word) in words.iter().enumerate() {
        let cleaned: String = word
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let capitalized = cleaned.chars().next().is_some_and(|c| c.is_ascii_uppercase());
        if i > 0 && capitalized {
            current.push(cleaned);
        } else {
            if !current.is_empty() {
                phrases.push(current.join(" "));
                current = Vec::new();
            }
        }
    }
    if !current.is_empty() {
        phrases.push(current.join(" "));
    }
    phrases
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Vec<String> {
        vec![
            "beltline".to_string(),
            "mission".to_string(),
            "tuscany-hills".to_string(),
        ]
    }

    #[test]
    fn exact_and_multi_word_mentions_resolve() {
        let m = extract_communities("Is Beltline safer than Tuscany Hills?", &[], &registry(), 1);
        assert_eq!(m.resolved, vec!["beltline".to_string(), "tuscany-hills".to_string()]);
        assert!(m.unresolved.is_empty());
    }

    #[test]
    fn typos_resolve_fuzzily() {
        let m = extract_communities("how safe is Beltlin these days", &[], &registry(), 1);
        assert_eq!(m.resolved, vec!["beltline".to_string()]);
    }

    #[test]
    fn unknown_capitalized_names_are_reported() {
        let m = extract_communities("Is Springbank safe?", &[], &registry(), 1);
        assert!(m.resolved.is_empty());
        assert_eq!(m.unresolved, vec!["Springbank".to_string()]);
    }

    #[test]
    fn hints_resolve_before_question_mentions() {
        let m = extract_communities("is it safe there", &["Mission".to_string()], &registry(), 1);
        assert_eq!(m.resolved, vec!["mission".to_string()]);
    }

    #[test]
    fn question_opening_word_is_not_a_name() {
        let m = extract_communities("Where should I live?", &[], &registry(), 1);
        assert!(m.resolved.is_empty());
        assert!(m.unresolved.is_empty());
    }
}
