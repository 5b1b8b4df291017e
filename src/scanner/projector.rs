use serde::{Deserialize, Serialize};

use crate::classify::ClassificationResult;

/// Label shown before the first classification lands.
pub const PLACEHOLDER_LABEL: &str = "...";

const DEFAULT_MESSAGE: &str = "Analyzing your mood...";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayState {
    pub label: String,
    pub confidence_percent: f64,
    pub message: String,
}

impl Default for DisplayState {
    fn default() -> Self {
        project(None)
    }
}

pub fn project(result: Option<&ClassificationResult>) -> DisplayState {
    match result {
        Some(result) => DisplayState {
            label: result.emotion.clone(),
            confidence_percent: result.confidence,
            message: message_for(&result.emotion).to_string(),
        },
        None => DisplayState {
            label: PLACEHOLDER_LABEL.to_string(),
            confidence_percent: 0.0,
            message: DEFAULT_MESSAGE.to_string(),
        },
    }
}

pub fn message_for(label: &str) -> &'static str {
    match label.trim().to_ascii_lowercase().as_str() {
        "happy" => "Good to see you smiling! Keep it up for a reward!",
        "sad" => "Why the long face? Hope things get better!",
        "angry" => "Take a deep breath. Stay calm!",
        "neutral" => "Feeling calm and collected.",
        "surprise" => "Whoa! Something exciting happening?",
        "fear" => "Don't worry, everything's alright.",
        "disgust" => "Something not quite right?",
        "error" => "Couldn't detect emotion. Try again!",
        _ => DEFAULT_MESSAGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::RewardStatus;

    #[test]
    fn absent_result_shows_placeholder() {
        let display = project(None);
        assert_eq!(display.label, PLACEHOLDER_LABEL);
        assert_eq!(display.confidence_percent, 0.0);
        assert_eq!(display.message, "Analyzing your mood...");
    }

    #[test]
    fn known_labels_map_case_insensitively() {
        let result = ClassificationResult::new("Happy", 91.0, RewardStatus::Collected);
        let display = project(Some(&result));

        assert_eq!(display.label, "Happy");
        assert_eq!(display.confidence_percent, 91.0);
        assert_eq!(
            display.message,
            "Good to see you smiling! Keep it up for a reward!"
        );
        assert_eq!(message_for("FEAR"), "Don't worry, everything's alright.");
    }

    #[test]
    fn error_result_projects_error_label() {
        let display = project(Some(&ClassificationResult::error()));
        assert_eq!(display.label, "Error");
        assert_eq!(display.message, "Couldn't detect emotion. Try again!");
    }

    #[test]
    fn unknown_label_gets_default_message() {
        assert_eq!(message_for("contempt"), DEFAULT_MESSAGE);
        assert_eq!(message_for(""), DEFAULT_MESSAGE);
    }
}
