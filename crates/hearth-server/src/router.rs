// Input validation: turns a raw line into a (verb, tokens) pair.

use thiserror::Error;

/// Verbs the server understands, implemented or not.
pub const VOCABULARY: [&str; 8] = [
    "look",
    "go",
    "get",
    "drop",
    "inventory",
    "help",
    "quit",
    "say",
];

/// A line the player typed that cannot be dispatched.
///
/// The `Display` text is sent back to the player verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("\n\rNo command entered.\n\r")]
    Empty,
    #[error("\n\rI don't understand your command.\n\r")]
    Unrecognized,
}

/// A line that names a known verb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidCommand {
    /// The first token that is in the vocabulary.
    pub verb: String,
    /// Every token of the line, lower-cased, including any before the verb.
    pub tokens: Vec<String>,
}

/// Validate `line` against `vocabulary`.
///
/// The line is trimmed, split on whitespace and lower-cased. The verb is the
/// first token (scanning left to right) that matches a vocabulary entry, so
/// leading filler words are skipped rather than rejected: `"please look"`
/// is a `look`.
pub fn validate_command(line: &str, vocabulary: &[&str]) -> Result<ValidCommand, InputError> {
    let tokens: Vec<String> = line.split_whitespace().map(str::to_lowercase).collect();
    if tokens.is_empty() {
        return Err(InputError::Empty);
    }

    let verb = tokens
        .iter()
        .find(|token| vocabulary.iter().any(|v| v.eq_ignore_ascii_case(token)))
        .cloned()
        .ok_or(InputError::Unrecognized)?;

    Ok(ValidCommand { verb, tokens })
}

/// Validator bound to a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct CommandRouter {
    vocabulary: Vec<&'static str>,
}

impl CommandRouter {
    pub fn new(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
        }
    }

    pub fn route(&self, line: &str) -> Result<ValidCommand, InputError> {
        validate_command(line, &self.vocabulary)
    }
}

impl Default for CommandRouter {
    fn default() -> Self {
        Self::new(&VOCABULARY)
    }
}
