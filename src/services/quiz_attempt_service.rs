use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use validator::Validate;

use crate::{
    errors::{AppError, AppResult, FieldErrors},
    models::{
        domain::{AnswerType, AttemptStatus, Question, Quiz, QuizAttempt, UserAnswer},
        dto::{
            quiz_dto::QuizDetailDto,
            request::{AnswerInput, PaginationParams, StartAttemptRequest, SubmitAttemptRequest},
            response::{Paginated, QuizAttemptDto, StartAttemptResponse},
        },
    },
    repositories::{QuizAttemptRepository, QuizRepository},
};

pub const MAX_SCORE: f64 = 100.0;

pub struct QuizAttemptService {
    quizzes: Arc<dyn QuizRepository>,
    attempts: Arc<dyn QuizAttemptRepository>,
}

impl QuizAttemptService {
    pub fn new(quizzes: Arc<dyn QuizRepository>, attempts: Arc<dyn QuizAttemptRepository>) -> Self {
        Self { quizzes, attempts }
    }

    /// Opens an attempt; a user may hold only one started attempt per quiz.
    pub async fn start_attempt(
        &self,
        user_id: &str,
        request: StartAttemptRequest,
    ) -> AppResult<StartAttemptResponse> {
        request.validate()?;

        let quiz = self
            .quizzes
            .find_by_id(&request.quiz)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz with id '{}' not found", request.quiz)))?;

        if let Some(active) = self.attempts.find_active(user_id, &quiz.id).await? {
            return Err(active_attempt_conflict(active));
        }

        let attempt = match self.attempts.create(QuizAttempt::start(user_id, &quiz.id)).await {
            Ok(attempt) => attempt,
            // Lost a race against a concurrent start; report the winner.
            Err(AppError::AlreadyExists(message)) => {
                return match self.attempts.find_active(user_id, &quiz.id).await? {
                    Some(active) => Err(active_attempt_conflict(active)),
                    None => Err(AppError::AlreadyExists(message)),
                };
            }
            Err(err) => return Err(err),
        };

        log::info!("User {} started attempt {} on quiz {}", user_id, attempt.id, quiz.id);

        Ok(StartAttemptResponse {
            attempt_id: attempt.id,
            started_at: attempt.started_at,
            quiz: QuizDetailDto::from_quiz(&quiz, false),
        })
    }

    pub async fn submit_attempt(
        &self,
        user_id: &str,
        attempt_id: &str,
        request: SubmitAttemptRequest,
    ) -> AppResult<QuizAttemptDto> {
        let mut attempt = self.find_own_attempt(user_id, attempt_id).await?;
        if attempt.is_completed() {
            return Err(already_completed(&attempt));
        }

        request.validate()?;

        let quiz = self
            .quizzes
            .find_by_id(&attempt.quiz_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Quiz with id '{}' not found", attempt.quiz_id)))?;

        let (answers, score) = Self::grade_attempt(&quiz, &request.answers)?;

        let now = Utc::now();
        attempt.status = AttemptStatus::Completed;
        attempt.completed_at = Some(now);
        attempt.answers = answers;
        attempt.score = score;

        if !self.attempts.complete(attempt.clone()).await? {
            return Err(already_completed(&attempt));
        }

        log::info!(
            "User {} completed attempt {} on quiz {} with score {}",
            user_id,
            attempt.id,
            attempt.quiz_id,
            attempt.score
        );
        Ok(QuizAttemptDto::from(attempt))
    }

    pub async fn get_attempt(&self, user_id: &str, attempt_id: &str) -> AppResult<QuizAttemptDto> {
        self.find_own_attempt(user_id, attempt_id)
            .await
            .map(QuizAttemptDto::from)
    }

    pub async fn list_attempts(
        &self,
        user_id: &str,
        pagination: PaginationParams,
    ) -> AppResult<Paginated<QuizAttemptDto>> {
        pagination.validate()?;

        let (offset, limit) = (pagination.offset(), pagination.limit());
        let (attempts, count) = self.attempts.list_by_user(user_id, offset, limit).await?;

        Ok(Paginated {
            count,
            offset,
            limit,
            results: attempts.into_iter().map(QuizAttemptDto::from).collect(),
        })
    }

    /// Other users' attempts are reported as missing.
    async fn find_own_attempt(&self, user_id: &str, attempt_id: &str) -> AppResult<QuizAttempt> {
        self.attempts
            .find_by_id(attempt_id)
            .await?
            .filter(|attempt| attempt.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Quiz attempt with id '{}' not found", attempt_id)))
    }

    /// Checks the submitted answers against the quiz and scores them.
    ///
    /// Every question is worth `MAX_SCORE / question_count`; a question counts
    /// only when the selected set equals the correct set. Unanswered questions
    /// score nothing. The score is rounded to two decimals.
    pub fn grade_attempt(quiz: &Quiz, submitted: &[AnswerInput]) -> AppResult<(Vec<UserAnswer>, f64)> {
        let mut fields = FieldErrors::new();
        let mut seen_questions = HashSet::new();

        for (index, answer) in submitted.iter().enumerate() {
            let path = format!("answers[{}]", index);

            if !seen_questions.insert(answer.question_id.as_str()) {
                push(&mut fields, format!("{}.question_id", path), "Each question may be answered only once.");
                continue;
            }

            match quiz.question(&answer.question_id) {
                Some(question) => check_selection(question, answer, &path, &mut fields),
                None => push(
                    &mut fields,
                    format!("{}.question_id", path),
                    format!("Question '{}' does not belong to this quiz.", answer.question_id),
                ),
            }
        }

        if !fields.is_empty() {
            return Err(AppError::InvalidFields(fields));
        }

        let answered_at = Utc::now();
        let answers: Vec<UserAnswer> = submitted
            .iter()
            .filter_map(|answer| {
                quiz.question(&answer.question_id).map(|question| UserAnswer {
                    question_id: question.id.clone(),
                    selected_option_ids: answer.selected_options.clone(),
                    is_correct: Self::grade_question(question, &answer.selected_options),
                    answered_at,
                })
            })
            .collect();

        let correct = answers.iter().filter(|a| a.is_correct).count();
        let score = if quiz.questions.is_empty() {
            0.0
        } else {
            round_score(MAX_SCORE / quiz.questions.len() as f64 * correct as f64)
        };

        Ok((answers, score))
    }

    /// Correct when the selected options are exactly the correct options.
    fn grade_question(question: &Question, selected_option_ids: &[String]) -> bool {
        let correct: HashSet<&str> = question.correct_option_ids().into_iter().collect();
        let selected: HashSet<&str> = selected_option_ids.iter().map(String::as_str).collect();
        !correct.is_empty() && correct == selected
    }
}

fn check_selection(question: &Question, answer: &AnswerInput, path: &str, fields: &mut FieldErrors) {
    let selected_path = format!("{}.selected_options", path);

    if question.answer_type == AnswerType::Single && answer.selected_options.len() != 1 {
        push(
            fields,
            selected_path.clone(),
            "A single-answer question takes exactly one selected option.",
        );
    }

    let mut seen = HashSet::new();
    for option_id in &answer.selected_options {
        if !seen.insert(option_id.as_str()) {
            push(fields, selected_path.clone(), format!("Option '{}' is selected more than once.", option_id));
        } else if question.option(option_id).is_none() {
            push(
                fields,
                selected_path.clone(),
                format!("Option '{}' does not belong to this question.", option_id),
            );
        }
    }
}

fn push(fields: &mut FieldErrors, path: String, message: impl Into<String>) {
    fields.entry(path).or_default().push(message.into());
}

fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

fn active_attempt_conflict(active: QuizAttempt) -> AppError {
    AppError::conflict(
        "You already have an active attempt for this quiz.",
        Some(active.id),
    )
}

fn already_completed(attempt: &QuizAttempt) -> AppError {
    AppError::conflict(
        "This attempt has already been completed.",
        Some(attempt.id.clone()),
    )
}
