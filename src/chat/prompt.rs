//! Prompt templates and fixed answers used by chat.

/// Answer returned when no retrieved chunk made it into the context.
pub const NO_CONTEXT_ANSWER: &str = "No relevant information was found in the documents.";

/// Answer returned when the model produced an empty response.
pub const EMPTY_ANSWER_FALLBACK: &str = "Unable to generate a response from the model.";

/// Build the generation prompt for a question grounded in `context`.
pub fn build_prompt(context: &str, message: &str) -> String {
    if context.trim().is_empty() {
        return format!("Question: {message}\n\nAnswer: {NO_CONTEXT_ANSWER}");
    }

    format!(
        "Using the following information from the documents:\n\n\
         {context}\n\n\
         Question: {message}\n\n\
         Answer the question using only the information provided. If the answer is not in the \
         information, reply \"{NO_CONTEXT_ANSWER}\"\n\n\
         Answer:"
    )
}
