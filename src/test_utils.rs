use crate::models::{
    domain::{AnswerType, QuizCategory},
    dto::quiz_dto::{AnswerOptionInput, CreateQuizRequest, QuestionInput},
};

pub mod fixtures {
    use super::*;

    /// A single-answer question whose first option is the correct one.
    pub fn question_input(title: &str) -> QuestionInput {
        QuestionInput {
            id: None,
            title: title.to_string(),
            answer_type: AnswerType::Single,
            photo: None,
            answer_options: vec![option_input("yes", true), option_input("no", false)],
        }
    }

    pub fn option_input(text: &str, is_correct: bool) -> AnswerOptionInput {
        AnswerOptionInput {
            id: None,
            text: text.to_string(),
            is_correct,
        }
    }

    pub fn create_quiz_request(questions: Vec<QuestionInput>) -> CreateQuizRequest {
        CreateQuizRequest {
            title: "Capitals".to_string(),
            description: "European capitals".to_string(),
            category: QuizCategory::Geography,
            is_time_limited: false,
            time_limit: None,
            questions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use crate::services::quiz_graph::validate_questions;

    #[test]
    fn test_fixture_questions_are_valid() {
        let request = create_quiz_request(vec![question_input("Q1"), question_input("Q2")]);
        assert!(validate_questions(&request.questions).is_ok());
        assert_eq!(request.questions[0].answer_options.len(), 2);
    }
}
