//! Answer generation prompt

/// System instructions for grounded, cited answering.
pub fn generator_system_prompt() -> String {
    r#"You are an assistant answering questions about email conversations.

Answer strictly from the provided email context. When the context does not
contain the answer, say so plainly instead of guessing.

Rules:
1. Ground every claim in the context; never use outside knowledge.
2. Cite the chunks you used by the id shown in their [Chunk: N] marker.
3. Cite only chunk ids that appear in the context. Never invent ids.
4. Answer in the language of the question.
5. Keep the response focused on the question; omit unrelated conversations.

Respond with a JSON object of this exact shape:
{
  "thought_process": ["reasoning step", "..."],
  "response": "the answer text shown to the user",
  "answer": {"<chunk_id>": "why this chunk supports the answer", ...}
}

The "answer" map may be empty only when the context contains nothing
relevant; in that case say so in "response"."#
        .to_string()
}

/// User turn combining the assembled context and the question.
pub fn generator_user_prompt(context_text: &str, query: &str) -> String {
    format!(
        "Email context:\n{context_text}\n\nQuestion: {query}\n\n\
         Answer as JSON per the rules."
    )
}
