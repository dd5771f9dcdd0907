use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::{
    auth::{is_creator, require_creator},
    errors::{flatten_validation_errors, AppError, AppResult, FieldErrors},
    models::{
        domain::{Quiz, QuizCategory},
        dto::{
            quiz_dto::{CreateQuizRequest, QuizDetailDto, QuizSummaryDto, UpdateQuizRequest},
            request::QuizListQuery,
            response::Paginated,
        },
    },
    repositories::{QuizFilter, QuizRepository},
    services::quiz_graph,
};

pub struct QuizService {
    repository: Arc<dyn QuizRepository>,
}

impl QuizService {
    pub fn new(repository: Arc<dyn QuizRepository>) -> Self {
        Self { repository }
    }

    pub async fn list_quizzes(&self, query: QuizListQuery) -> AppResult<Paginated<QuizSummaryDto>> {
        query.validate()?;

        let category = query
            .category
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(str::parse::<QuizCategory>)
            .transpose()?;
        let filter = QuizFilter {
            search: query.search.clone(),
            category,
        };

        let pagination = query.pagination();
        let (offset, limit) = (pagination.offset(), pagination.limit());
        let (quizzes, count) = self.repository.list(filter, offset, limit).await?;

        Ok(Paginated {
            count,
            offset,
            limit,
            results: quizzes.iter().map(QuizSummaryDto::from).collect(),
        })
    }

    /// Correct-answer flags are only shown to the quiz's creator.
    pub async fn get_quiz(&self, id: &str, viewer_id: Option<&str>) -> AppResult<QuizDetailDto> {
        let quiz = self.find_quiz(id).await?;
        let reveal = viewer_id.is_some_and(|viewer| is_creator(viewer, &quiz));
        Ok(QuizDetailDto::from_quiz(&quiz, reveal))
    }

    pub async fn create_quiz(&self, creator_id: &str, request: CreateQuizRequest) -> AppResult<QuizDetailDto> {
        let mut fields = FieldErrors::new();
        if let Err(errors) = request.validate() {
            flatten_validation_errors(&errors, "", &mut fields);
        }
        absorb(quiz_graph::validate_questions(&request.questions), &mut fields)?;
        let time_limit = absorb(
            quiz_graph::ensure_time_limit(request.is_time_limited, request.time_limit),
            &mut fields,
        )?;
        if !fields.is_empty() {
            return Err(AppError::InvalidFields(fields));
        }

        let quiz = Quiz::new(
            &request.title,
            &request.description,
            request.category,
            request.is_time_limited,
            time_limit.flatten(),
            creator_id,
            quiz_graph::build_questions(request.questions),
        );
        let quiz = self.repository.create(quiz).await?;

        log::info!(
            "Quiz {} created by {} with {} questions",
            quiz.id,
            creator_id,
            quiz.questions.len()
        );
        Ok(QuizDetailDto::from_quiz(&quiz, true))
    }

    /// Full update: every field is replaced and the question tree reconciled.
    pub async fn replace_quiz(
        &self,
        actor_id: &str,
        id: &str,
        request: CreateQuizRequest,
    ) -> AppResult<QuizDetailDto> {
        let quiz = self.find_quiz(id).await?;
        require_creator(actor_id, &quiz)?;

        // A full payload without `time_limit` means "no limit", not "keep the stored one".
        quiz_graph::ensure_time_limit(request.is_time_limited, request.time_limit)?;

        self.apply_update(quiz, UpdateQuizRequest::from(request)).await
    }

    /// Partial update: absent fields keep their stored values.
    pub async fn patch_quiz(
        &self,
        actor_id: &str,
        id: &str,
        request: UpdateQuizRequest,
    ) -> AppResult<QuizDetailDto> {
        let quiz = self.find_quiz(id).await?;
        require_creator(actor_id, &quiz)?;

        self.apply_update(quiz, request).await
    }

    pub async fn delete_quiz(&self, actor_id: &str, id: &str) -> AppResult<()> {
        let quiz = self.find_quiz(id).await?;
        require_creator(actor_id, &quiz)?;

        self.repository.delete(&quiz.id).await?;
        log::info!("Quiz {} deleted by {}", quiz.id, actor_id);
        Ok(())
    }

    async fn apply_update(&self, mut quiz: Quiz, request: UpdateQuizRequest) -> AppResult<QuizDetailDto> {
        let mut fields = FieldErrors::new();
        if let Err(errors) = request.validate() {
            flatten_validation_errors(&errors, "", &mut fields);
        }
        if let Some(questions) = &request.questions {
            absorb(quiz_graph::validate_questions(questions), &mut fields)?;
        }

        let is_time_limited = request.is_time_limited.unwrap_or(quiz.is_time_limited);
        let time_limit = absorb(
            quiz_graph::ensure_time_limit(is_time_limited, request.time_limit.or(quiz.time_limit)),
            &mut fields,
        )?;
        if !fields.is_empty() {
            return Err(AppError::InvalidFields(fields));
        }

        if let Some(title) = request.title {
            quiz.title = title;
        }
        if let Some(description) = request.description {
            quiz.description = description;
        }
        if let Some(category) = request.category {
            quiz.category = category;
        }
        quiz.is_time_limited = is_time_limited;
        quiz.time_limit = time_limit.flatten();

        let summary = match request.questions {
            Some(incoming) => {
                let (questions, summary) =
                    quiz_graph::reconcile_questions(std::mem::take(&mut quiz.questions), incoming);
                quiz.questions = questions;
                Some(summary)
            }
            None => None,
        };
        let loaded_modified_at = std::mem::replace(&mut quiz.modified_at, Utc::now());

        let quiz = self.repository.replace(quiz, loaded_modified_at).await?;

        match summary {
            Some(summary) => log::info!("Quiz {} updated: {}", quiz.id, summary),
            None => log::info!("Quiz {} updated, questions untouched", quiz.id),
        }
        Ok(QuizDetailDto::from_quiz(&quiz, true))
    }

    async fn find_quiz(&self, id: &str) -> AppResult<Quiz> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz with id '{}' not found", id)))
    }
}

/// Folds field errors into `fields` so every problem is reported at once.
fn absorb<T>(result: AppResult<T>, fields: &mut FieldErrors) -> AppResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(AppError::InvalidFields(errors)) => {
            for (path, messages) in errors {
                fields.entry(path).or_default().extend(messages);
            }
            Ok(None)
        }
        Err(other) => Err(other),
    }
}
