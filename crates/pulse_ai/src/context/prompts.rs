/// Prompt handed to the external generator. The contract is explicit:
/// retrieved data only, inline `[[cite:...]]` markers, plain statement when
/// the data cannot answer.
pub fn answer_prompt(question: &str, context_blocks: &str) -> String {
    format!(
        r#"You are answering a question about city community profiles using retrieved data.

Rules (non-negotiable):
1) Use ONLY the retrieved data below. Do not invent facts.
2) Every concrete claim MUST include an inline citation marker in the form [[cite:<community>/<section>]], where <community> and <section> come from a block heading below.
3) Quote figures exactly as they appear in the retrieved data; do not compute or derive new ones.
4) If the retrieved data does not answer the question, say plainly that the data is not available. Do not guess.
5) When a block notes an available visualization, you may point the reader to it.

Retrieved data:
{context_blocks}

Question: {question}

Output:
- Return plain prose.
- Include inline citations as specified.
"#
    )
}
