pub mod llm;

use serde::{Serialize, Deserialize};

use crate::engine::SpeechRequest;
use crate::error::NarrationError;

pub use llm::QuestionGenerator;

/// The four Cartesian Logic reframing questions for one belief
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartesianQuestions {
    pub theorem: String,
    pub converse: String,
    pub inverse: String,
    pub non_mirror_reverse: String,
}

impl CartesianQuestions {
    pub fn as_list(&self) -> [&str; 4] {
        [&self.theorem, &self.converse, &self.inverse, &self.non_mirror_reverse]
    }

    pub fn labels() -> [&'static str; 4] {
        ["Theorem", "Converse", "Inverse", "Non-Mirror Reverse"]
    }

    pub fn to_requests(&self, voice_id: Option<&str>) -> Vec<SpeechRequest> {
        self.as_list()
            .iter()
            .map(|q| SpeechRequest::new(*q).with_voice(voice_id.map(str::to_string)))
            .collect()
    }

    pub(crate) fn from_list(list: Vec<String>) -> Option<Self> {
        let [theorem, converse, inverse, non_mirror_reverse]: [String; 4] = list.try_into().ok()?;
        Some(Self { theorem, converse, inverse, non_mirror_reverse })
    }
}

// Longest first so "i can not" wins over "i can"
const LIMITING_PREFIXES: &[&str] = &[
    "i am not able to ",
    "i'm not able to ",
    "i am unable to ",
    "i'm unable to ",
    "i am afraid to ",
    "i'm afraid to ",
    "i'm scared to ",
    "i should not ",
    "i shouldn't ",
    "i couldn't ",
    "i will never ",
    "i can not ",
    "i cannot ",
    "i can't ",
    "i won't ",
    "i do not ",
    "i don't ",
    "i never ",
];

/// Second-person form of a first-person word, if it has one
fn swap_person(word: &str) -> Option<&'static str> {
    Some(match word {
        "i" => "you",
        "me" => "you",
        "my" => "your",
        "mine" => "yours",
        "myself" => "yourself",
        "i'm" => "you're",
        "i've" => "you've",
        "i'll" => "you'll",
        "am" => "are",
        _ => return None,
    })
}

fn to_second_person(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let trimmed = word.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != '\'');
            let tail = &word[trimmed.len()..];
            match swap_person(&trimmed.to_lowercase()) {
                Some(swapped) => format!("{swapped}{tail}"),
                None => word.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduce a belief to the action phrase the questions are built around
pub fn action_phrase(belief: &str) -> Result<String, NarrationError> {
    let normalized = belief
        .replace(['\u{2019}', '\u{2018}'], "'")
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim()
        .to_string();
    if normalized.is_empty() {
        return Err(NarrationError::EmptyBelief);
    }

    let lower = normalized.to_lowercase();
    for prefix in LIMITING_PREFIXES {
        if !lower.starts_with(prefix) {
            continue;
        }
        if let Some(rest) = normalized.get(prefix.len()..).map(str::trim).filter(|r| !r.is_empty()) {
            return Ok(to_second_person(rest));
        }
    }

    Ok(format!("let go of the belief that {}", to_second_person(&lower)))
}

/// Template questions, used directly or when remote generation fails
pub fn cartesian_questions(belief: &str) -> Result<CartesianQuestions, NarrationError> {
    let action = action_phrase(belief)?;
    Ok(CartesianQuestions {
        theorem: format!("What would happen if you {action}?"),
        converse: format!("What wouldn't happen if you {action}?"),
        inverse: format!("What would happen if you didn't {action}?"),
        non_mirror_reverse: format!("What wouldn't happen if you didn't {action}?"),
    })
}

/// Ask the generator first; any failure falls back to the templates
pub async fn generate_questions(
    generator: Option<&QuestionGenerator>,
    belief: &str,
) -> Result<CartesianQuestions, NarrationError> {
    let templated = cartesian_questions(belief)?;

    let Some(generator) = generator else {
        return Ok(templated);
    };

    match generator.generate(belief.trim()).await {
        Ok(questions) => Ok(questions),
        Err(e) => {
            tracing::warn!("Question generation failed: {}. Using templates.", e);
            Ok(templated)
        }
    }
}
