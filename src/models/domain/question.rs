use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Question {
    pub id: String,
    pub title: String,
    pub answer_type: AnswerType,
    pub order: i32, // 1-based, dense within the quiz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub answer_options: Vec<AnswerOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct AnswerOption {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize, Copy)]
#[serde(rename_all = "lowercase")]
pub enum AnswerType {
    #[default]
    Single, // Exactly one correct option
    Multiple, // At least two correct options
}

impl Question {
    pub fn option(&self, option_id: &str) -> Option<&AnswerOption> {
        self.answer_options.iter().find(|o| o.id == option_id)
    }

    pub fn correct_option_ids(&self) -> Vec<&str> {
        self.answer_options
            .iter()
            .filter(|o| o.is_correct)
            .map(|o| o.id.as_str())
            .collect()
    }
}
