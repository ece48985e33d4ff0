use std::collections::BTreeSet;

use pulse_core::error::AppError;

use crate::context::Citation;

/// Enforce the citation contract on generator output: at least one
/// `[[cite:<community>/<section>]]` marker, and every marker within the
/// approved set the assembler actually included.
pub fn enforce_citations(output: &str, allowed: &[Citation]) -> Result<(), AppError> {
    let cited = extract_citation_markers(output);
    if cited.is_empty() {
        return Err(AppError::new(
            "CITATION_REQUIRED",
            "Answer must include citation markers",
        ));
    }
    for (community, section) in cited {
        let approved = allowed
            .iter()
            .any(|c| c.community == community && c.section.as_str() == section);
        if !approved {
            return Err(AppError::new(
                "CITATION_INVALID",
                "Answer cited a source outside the retrieved context",
            )
            .with_details(format!("community={community}; section={section}")));
        }
    }
    Ok(())
}

/// Parse `[[cite:<community>/<section>]]` markers.
pub fn extract_citation_markers(text: &str) -> BTreeSet<(String, String)> {
    let mut out = BTreeSet::new();
    let bytes = text.as_bytes();
    let mut i = 0usize;
    while i + 7 < bytes.len() {
        if bytes[i..].starts_with(b"[[cite:") {
            let start = i + 7;
            if let Some(end) = bytes[start..].iter().position(|&b| b == b']') {
                let body = &text[start..start + end];
                let after = start + end;
                if text.get(after..after + 2) == Some("]]") {
                    if let Some((community, section)) = body.split_once('/') {
                        let community = community.trim();
                        let section = section.trim();
                        if !community.is_empty() && !section.is_empty() {
                            out.insert((community.to_string(), section.to_string()));
                        }
                    }
                }
                i = after + 2;
                continue;
            }
        }
        i += 1;
    }
    out
}

/// Fixed-form answer for the insufficient-data outcome. Names what is
/// missing when the retriever identified unknown communities.
pub fn insufficient_answer(missing: &[String]) -> String {
    if missing.is_empty() {
        "Data not available. No indexed community data supports this question.".to_string()
    } else {
        format!(
            "Data not available. Missing community data for: {}.",
            missing.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_core::domain::SectionTag;

    fn allowed() -> Vec<Citation> {
        vec![Citation {
            community: "beltline".to_string(),
            section: SectionTag::Safety,
        }]
    }

    #[test]
    fn extracts_markers() {
        let cited = extract_citation_markers(
            "Crime is down [[cite:beltline/safety]] and flat [[cite:mission/housing]].",
        );
        assert_eq!(cited.len(), 2);
        assert!(cited.contains(&("beltline".to_string(), "safety".to_string())));
    }

    #[test]
    fn rejects_output_without_markers() {
        let err = enforce_citations("no citations here", &allowed()).unwrap_err();
        assert_eq!(err.code, "CITATION_REQUIRED");
    }

    #[test]
    fn rejects_markers_outside_the_approved_set() {
        let err =
            enforce_citations("see [[cite:mission/safety]]", &allowed()).unwrap_err();
        assert_eq!(err.code, "CITATION_INVALID");
    }

    #[test]
    fn accepts_approved_markers() {
        assert!(enforce_citations("supported [[cite:beltline/safety]]", &allowed()).is_ok());
    }

    #[test]
    fn malformed_markers_are_ignored() {
        assert!(extract_citation_markers("[[cite:beltline]] [[cite:/safety]]").is_empty());
    }
}
