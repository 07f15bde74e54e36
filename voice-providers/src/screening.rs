//! Pre-screening closure
//!
//! The conversational agent interviews a patient before they see a senior
//! doctor. Once the patient has described how long, how badly and where it
//! hurts, the agent stops asking questions, hands over a summary and closes
//! the conversation.
use crate::transcription::{Speaker, Turn};

/// Messages (user and agent) required before closure is considered
pub const MIN_SCREENING_MESSAGES: usize = 6;

/// Spoken once the screening is complete
pub const CLOSURE_MESSAGE: &str = "உங்க symptoms பத்தி நான் senior doctor-கிட்ட சொல்லி வைக்கறேன். \
அவங்க உங்களை பார்த்து proper treatment கொடுப்பாங்க. கவலைப்படாதீங்க, நாங்க உங்களுக்கு help பண்றோம். எல்லாம் சரியாகும்.";

const DURATION_WORDS: &[&str] = &["day", "week", "month", "yesterday", "நாள", "வாரம்", "மாசம்", "நேத்து"];
const SEVERITY_WORDS: &[&str] = &["pain", "severe", "mild", "வலி", "அதிகம்", "கம்மி"];
const LOCATION_WORDS: &[&str] = &["leg", "head", "chest", "stomach", "கால்", "தலை", "மார்பு", "வயிறு"];

/// Which investigative details the patient has given so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreeningFindings {
    pub duration: bool,
    pub severity: bool,
    pub location: bool,
}

impl ScreeningFindings {
    /// Scan the patient's side of the conversation
    pub fn assess(history: &[Turn]) -> Self {
        let said = patient_messages(history).join(" ").to_lowercase();
        let mentions = |words: &[&str]| words.iter().any(|word| said.contains(word));

        Self {
            duration: mentions(DURATION_WORDS),
            severity: mentions(SEVERITY_WORDS) || said.chars().any(|c| c.is_ascii_digit()),
            location: mentions(LOCATION_WORDS),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.duration && self.severity && self.location
    }
}

/// True once the conversation is long enough and every detail is known
pub fn ready_for_closure(history: &[Turn]) -> bool {
    history.len() >= MIN_SCREENING_MESSAGES && ScreeningFindings::assess(history).is_complete()
}

pub fn patient_messages(history: &[Turn]) -> Vec<&str> {
    history
        .iter()
        .filter(|turn| turn.speaker == Speaker::User)
        .map(|turn| turn.text.as_str())
        .collect()
}

/// Prompt asking an LLM for the senior doctor's hand-over summary
pub fn summary_prompt(history: &[Turn]) -> String {
    format!(
        "Based on this conversation with a patient, create a brief medical summary for the senior doctor:\n\n\
         Patient conversation:\n{}\n\n\
         Create a summary in this format:\n\
         - Chief complaint: [main symptoms/concerns]\n\
         - Duration: [when symptoms started]\n\
         - Severity: [mild/moderate/severe if mentioned]\n\
         - Associated symptoms: [other symptoms mentioned]\n\
         - Patient concerns: [any worries expressed]\n\
         - Recommended action: [urgent/routine consultation]\n\n\
         Keep it professional and concise.",
        patient_messages(history).join(" | ")
    )
}
