/// Generation context: previous rounds + latest feedback → instruction text.
///
/// History is embedded as a JSON array, one object per round:
///
///   {"option1": {...}, "option2": {...}, "preferred": "option2", "feedback": "softer"}
///
/// The same encoding can be decoded back with `decode_history`.

use crate::pulse::Round;

const RESPONSE_SHAPE: &str = r#"[{"option1": {"vibrations": [v1, v2, ...], "delays": [d1, d2, ...]}, "option2": {"vibrations": [v1, v2, ...], "delays": [d1, d2, ...]}}]"#;

/// Encode rounds in submission order.
pub fn encode_history(history: &[Round]) -> Result<String, serde_json::Error> {
    serde_json::to_string(history)
}

#[cfg(test)]
pub fn decode_history(encoded: &str) -> Result<Vec<Round>, serde_json::Error> {
    serde_json::from_str(encoded)
}

/// Build the single user message sent to the generation service.
pub fn build_prompt(history: &[Round], feedback: &str) -> Result<String, serde_json::Error> {
    let history_json = encode_history(history)?;
    let feedback = feedback.trim();

    let mut prompt = String::with_capacity(1024 + history_json.len());
    prompt.push_str(
        "Your job is to design the perfect vibration for a phone's short button press. \
         Describe each vibration with timings in exactly this format: ",
    );
    prompt.push_str(RESPONSE_SHAPE);
    prompt.push_str(
        " where v_ is how long the phone vibrates in milliseconds and d_ is the delay \
         in milliseconds after that vibration. Both arrays of an option must have the same \
         length and the last delay must always be 0.\n",
    );

    if history.is_empty() {
        prompt.push_str("There are no previous results yet.\n");
    } else {
        prompt.push_str(&format!(
            "Previous rounds, oldest first (\"preferred\" is the option the user picked, or \
             \"neither\"): {history_json}\n"
        ));
    }

    prompt.push_str(
        "Create new vibration timings based on the user's feedback and the previously \
         preferred options. The goal is a vibration that feels as natural as possible and \
         causes no discomfort or fatigue, improving on every iteration.\n",
    );
    if !feedback.is_empty() {
        prompt.push_str(&format!("Feedback from the user: \"{feedback}\"\n"));
    }
    prompt.push_str(
        "Provide 2 options for the user to choose from. Respond only in the format above, \
         with no additional text and no code blocks.",
    );
    Ok(prompt)
}
