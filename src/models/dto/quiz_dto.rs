use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::domain::question::{AnswerOption, AnswerType};
use crate::models::domain::quiz::QuizCategory;
use crate::models::domain::{Question, Quiz};

/// Full quiz payload, used by `POST` and `PUT`.
///
/// Scalar fields are checked by `validate()`; the question tree is checked by
/// `services::quiz_graph::validate_questions` so every failure carries its path.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateQuizRequest {
	#[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
	pub title: String,
	#[serde(default)]
	#[validate(length(max = 5000))]
	pub description: String,
	#[serde(default)]
	pub category: QuizCategory,
	#[serde(default)]
	pub is_time_limited: bool,
	#[serde(default)]
	pub time_limit: Option<u32>,
	#[serde(default)]
	pub questions: Vec<QuestionInput>,
}

/// Partial quiz payload, used by `PATCH`. `questions: None` leaves them untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct UpdateQuizRequest {
	#[validate(length(min = 1, max = 200, message = "Title must be 1 to 200 characters"))]
	pub title: Option<String>,
	#[validate(length(max = 5000))]
	pub description: Option<String>,
	pub category: Option<QuizCategory>,
	pub is_time_limited: Option<bool>,
	pub time_limit: Option<u32>,
	pub questions: Option<Vec<QuestionInput>>,
}

impl From<CreateQuizRequest> for UpdateQuizRequest {
	fn from(request: CreateQuizRequest) -> Self {
		UpdateQuizRequest {
			title: Some(request.title),
			description: Some(request.description),
			category: Some(request.category),
			is_time_limited: Some(request.is_time_limited),
			time_limit: request.time_limit,
			questions: Some(request.questions),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct QuestionInput {
	/// Id of a persisted question to update; unknown or missing ids insert.
	#[serde(default)]
	pub id: Option<String>,
	#[validate(length(min = 1, max = 500, message = "Question title must be 1 to 500 characters"))]
	pub title: String,
	#[serde(default)]
	pub answer_type: AnswerType,
	#[serde(default)]
	#[validate(url(message = "Photo must be a valid URL"))]
	pub photo: Option<String>,
	#[serde(default)]
	pub answer_options: Vec<AnswerOptionInput>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AnswerOptionInput {
	#[serde(default)]
	pub id: Option<String>,
	#[validate(length(min = 1, max = 500, message = "Option text must be 1 to 500 characters"))]
	pub text: String,
	#[serde(default)]
	pub is_correct: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuizSummaryDto {
	pub id: String,
	pub title: String,
	pub description: String,
	pub category: QuizCategory,
	pub is_time_limited: bool,
	pub time_limit: Option<u32>,
	pub creator_id: String,
	pub created_at: DateTime<Utc>,
	pub modified_at: DateTime<Utc>,
}

impl From<&Quiz> for QuizSummaryDto {
	fn from(quiz: &Quiz) -> Self {
		QuizSummaryDto {
			id: quiz.id.clone(),
			title: quiz.title.clone(),
			description: quiz.description.clone(),
			category: quiz.category,
			is_time_limited: quiz.is_time_limited,
			time_limit: quiz.time_limit,
			creator_id: quiz.creator_id.clone(),
			created_at: quiz.created_at,
			modified_at: quiz.modified_at,
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuizDetailDto {
	#[serde(flatten)]
	pub summary: QuizSummaryDto,
	pub questions: Vec<QuestionDto>,
}

impl QuizDetailDto {
	/// `reveal_answers` controls whether `is_correct` flags are serialized.
	pub fn from_quiz(quiz: &Quiz, reveal_answers: bool) -> Self {
		let mut questions: Vec<QuestionDto> = quiz
			.questions
			.iter()
			.map(|q| QuestionDto::from_question(q, reveal_answers))
			.collect();
		questions.sort_by_key(|q| q.order);

		QuizDetailDto {
			summary: QuizSummaryDto::from(quiz),
			questions,
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuestionDto {
	pub id: String,
	pub title: String,
	pub answer_type: AnswerType,
	pub order: i32,
	pub photo: Option<String>,
	pub answer_options: Vec<AnswerOptionDto>,
}

impl QuestionDto {
	fn from_question(question: &Question, reveal_answers: bool) -> Self {
		QuestionDto {
			id: question.id.clone(),
			title: question.title.clone(),
			answer_type: question.answer_type,
			order: question.order,
			photo: question.photo.clone(),
			answer_options: question
				.answer_options
				.iter()
				.map(|o| AnswerOptionDto::from_option(o, reveal_answers))
				.collect(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswerOptionDto {
	pub id: String,
	pub text: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub is_correct: Option<bool>,
}

impl AnswerOptionDto {
	fn from_option(option: &AnswerOption, reveal_answers: bool) -> Self {
		AnswerOptionDto {
			id: option.id.clone(),
			text: option.text.clone(),
			is_correct: reveal_answers.then_some(option.is_correct),
		}
	}
}
