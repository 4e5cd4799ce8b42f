//! Turns a validation result into one corrective instruction for the model.

use crate::policy::{ForbiddenWord, Policy, ValidationResult};

const HEADER: &str = "Rewrite the code with the following additional rules.";

/// Build the correction message for a validation result.
///
/// An empty string means the result was clean and no further retry is
/// needed. Clauses appear in a fixed order: disallowed imports, word
/// substitutions, then one generic clause covering unreachable resources.
///
/// Replacement suggestions pair the matched words positionally against the
/// policy entries whose forbidden value was matched, mirroring the order the
/// checker reports hits in.
pub fn compose(result: &ValidationResult, policy: &Policy) -> String {
    if result.is_clean() {
        return String::new();
    }

    let mut message = String::from(HEADER);

    if !result.disallowed_imports.is_empty() {
        message.push_str(&format!(
            "\n- Do not use {}.",
            result.disallowed_imports.join(",")
        ));
    }

    let matched_entries: Vec<&ForbiddenWord> = policy
        .forbidden_words
        .iter()
        .filter(|word| result.forbidden_hits.contains(&word.forbidden))
        .collect();
    for (hit, entry) in result.forbidden_hits.iter().zip(matched_entries) {
        message.push_str(&format!(
            "\n- Use {} instead of {}.",
            entry.replacement, hit
        ));
    }

    if !result.unreachable_resources.is_empty() {
        message.push_str("\n- Do not use textures loaded from a URL.");
    }

    message
}
