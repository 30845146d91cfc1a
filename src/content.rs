//! Lesson context for the tutor session
//!
//! The verb/tense tables and their UI live outside this crate; all the
//! engine needs is the currently selected lesson, turned into the
//! system instruction and greeting the channel is opened with.

use crate::channel::SessionConfig;

/// The currently selected practice target.
#[derive(Debug, Clone)]
pub struct Lesson {
    /// Tense being practiced, e.g. "Presente de Indicativo"
    pub tense: String,
    /// Infinitive of the verb being practiced, e.g. "hablar"
    pub verb: String,
}

impl Lesson {
    pub fn new(tense: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            tense: tense.into(),
            verb: verb.into(),
        }
    }

    /// Build the fixed configuration a session connects with.
    pub fn session_config(&self, voice: &str) -> SessionConfig {
        SessionConfig {
            voice: voice.to_string(),
            system_instruction: self.system_instruction(),
            greeting: GREETING.to_string(),
        }
    }

    /// The tutor persona, parameterized by the selected tense and verb.
    fn system_instruction(&self) -> String {
        format!(
            "You are an expert Spanish conversation tutor with flawless native \
             pronunciation. The learner is practicing the conjugation of the verb \
             \"{verb}\" in the {tense}.\n\
             \n\
             Pronunciation guide:\n\
             - Use the natural, clear intonation of a native Castilian or Latin \
             American speaker.\n\
             - Stress the accented syllable firmly so the learner hears the \
             rhythm of the language.\n\
             - Explain gently in the learner's language, but switch to a full \
             native voice the moment you say a Spanish word or sentence.\n\
             \n\
             Pronoun reading rules (important):\n\
             - Where the table says \"El/Ella/Ud.\", read only \"El\" when \
             modeling, e.g. \"El habla\".\n\
             - Where the table says \"Ellos/Ellas/Uds.\", read only \"Ellos\", \
             e.g. \"Ellos hablan\".\n\
             \n\
             Lesson flow:\n\
             1. Briefly announce which conjugation you will practice together.\n\
             2. Read each conjugated form one at a time, following the pronoun \
             rules above, in clear native pronunciation.\n\
             3. Wait for the learner to repeat, encourage them, then move to \
             the next person.\n\
             4. When every form is done, close with praise and a short word of \
             encouragement.",
            verb = self.verb,
            tense = self.tense,
        )
    }
}

/// Sent once over the channel when the session opens, to elicit the
/// tutor's first utterance.
const GREETING: &str =
    "Hello! Shall we master these verb conjugations with native pronunciation?";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_is_parameterized_by_the_lesson() {
        let lesson = Lesson::new("Presente de Indicativo", "hablar");
        let config = lesson.session_config("Puck");
        assert!(config.system_instruction.contains("hablar"));
        assert!(config.system_instruction.contains("Presente de Indicativo"));
        assert_eq!(config.voice, "Puck");
        assert!(!config.greeting.is_empty());
    }
}
