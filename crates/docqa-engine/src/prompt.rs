//! Prompt assembly for grounded question answering.

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Instruction prompt with the retrieved context and the question. The model is
/// asked for a JSON object `{"answer": "..."}` and to say "I don't know" when
/// the context does not contain the answer.
pub fn build_prompt(question: &str, context: &[String]) -> String {
    let context = context.join(CONTEXT_SEPARATOR);
    format!(
        r#"
You are a helpful assistant. Use ONLY the context provided below.
If not found, say "I don't know".

Return JSON strictly in this schema:
{{
  "answer": "string"
}}

CONTEXT:
{context}

QUESTION:
{question}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_context_in_order_and_question() {
        let prompt = build_prompt("What colour is the sky?", &["The sky is blue.".into(), "Grass is green.".into()]);
        let sky = prompt.find("The sky is blue.").expect("first chunk");
        let grass = prompt.find("Grass is green.").expect("second chunk");
        assert!(sky < grass);
        assert!(prompt.contains("The sky is blue.\n\n---\n\nGrass is green."));
        assert!(prompt.contains("QUESTION:\nWhat colour is the sky?"));
        assert!(prompt.contains("\"answer\": \"string\""));
    }
}
