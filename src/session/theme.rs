use serde::{Deserialize, Serialize};

/// An interview topic with its icebreaker sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub id: String,
    pub title: String,
    /// Short fixed sequence of warmup questions. May be longer than
    /// the warmup phase ever asks; the shortcut policy bounds it.
    pub icebreakers: Vec<String>,
}

impl Theme {
    pub fn new(id: impl Into<String>, title: impl Into<String>, icebreakers: Vec<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            icebreakers,
        }
    }
}

/// Built-in themes offered during theme selection. The narrator can
/// also defer, in which case the interviewer opens with a general
/// prompt.
pub fn builtin_themes() -> Vec<Theme> {
    vec![
        Theme::new(
            "childhood",
            "Childhood & Growing Up",
            vec![
                "Where did you grow up?".to_string(),
                "What did your childhood home look like?".to_string(),
                "Who lived with you when you were young?".to_string(),
                "What games did you love to play?".to_string(),
                "What's your earliest memory?".to_string(),
            ],
        ),
        Theme::new(
            "family",
            "Family & Relationships",
            vec![
                "Tell me about your parents.".to_string(),
                "How did you meet your closest friend or partner?".to_string(),
                "What family tradition do you remember best?".to_string(),
            ],
        ),
        Theme::new(
            "work",
            "Work & Calling",
            vec![
                "What was your first job?".to_string(),
                "What work are you proudest of?".to_string(),
                "Was there a mentor who changed your path?".to_string(),
            ],
        ),
    ]
}

/// Theme used when the narrator defers the choice to the interviewer.
pub fn deferred_theme() -> Theme {
    Theme::new(
        "open",
        "Wherever the story goes",
        vec![
            "What's a moment from your life you find yourself returning to?".to_string(),
            "Who is someone who shaped who you are?".to_string(),
        ],
    )
}

/// Deterministic follow-up generator used when the live interviewer is
/// disabled or unreachable. Rotates through neutral prompts so the
/// conversation can always continue.
#[derive(Debug, Clone)]
pub struct ScriptedFollowUps {
    prompts: Vec<String>,
    next: usize,
}

impl Default for ScriptedFollowUps {
    fn default() -> Self {
        Self {
            prompts: vec![
                "What happened next?".to_string(),
                "How did that make you feel at the time?".to_string(),
                "Can you describe where you were when that happened?".to_string(),
                "Who else was part of that moment?".to_string(),
                "Looking back, what does that memory mean to you now?".to_string(),
            ],
            next: 0,
        }
    }
}

impl ScriptedFollowUps {
    pub fn next_question(&mut self) -> String {
        let prompt = self.prompts[self.next % self.prompts.len()].clone();
        self.next += 1;
        prompt
    }
}

/// Assemble the natural-language instructions handed to the live
/// interviewer for one session.
pub fn interviewer_instructions(theme: Option<&Theme>, narrator_name: Option<&str>) -> String {
    let mut parts = vec![
        "You are a warm, patient interviewer helping someone record their life story. \
         Ask one open-ended question at a time, follow up on details, and never rush."
            .to_string(),
    ];

    if let Some(name) = narrator_name {
        parts.push(format!("The narrator's name is {}.", name));
    }

    if let Some(theme) = theme {
        parts.push(format!("Today's conversation is about: {}.", theme.title));
    } else {
        parts.push("Let the narrator lead; pick a direction from what they share.".to_string());
    }

    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_follow_ups_rotate_deterministically() {
        let mut gen = ScriptedFollowUps::default();
        let first = gen.next_question();
        for _ in 0..4 {
            gen.next_question();
        }
        // Wraps around after the full rotation.
        assert_eq!(gen.next_question(), first);
    }

    #[test]
    fn instructions_mention_theme_and_name() {
        let theme = builtin_themes().remove(0);
        let text = interviewer_instructions(Some(&theme), Some("June"));
        assert!(text.contains("June"));
        assert!(text.contains(&theme.title));
    }
}
