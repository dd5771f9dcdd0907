//! Validation and reconciliation of a quiz's question tree.
//!
//! Everything here is pure: the services load the stored quiz, run these
//! functions over it and persist the result in a single write.

use std::collections::{HashMap, HashSet};
use std::fmt;

use uuid::Uuid;
use validator::Validate;

use crate::{
    errors::{flatten_validation_errors, AppError, AppResult, FieldErrors},
    models::{
        domain::{AnswerOption, AnswerType, Question},
        dto::quiz_dto::{AnswerOptionInput, QuestionInput},
    },
};

pub const MIN_QUESTIONS: usize = 1;
pub const MAX_QUESTIONS: usize = 20;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

/// Checks the whole question tree and reports every failure under its path,
/// e.g. `questions`, `questions[2]`, `questions[2].answer_options`.
pub fn validate_questions(questions: &[QuestionInput]) -> AppResult<()> {
    let mut fields = FieldErrors::new();

    if !(MIN_QUESTIONS..=MAX_QUESTIONS).contains(&questions.len()) {
        fields.entry("questions".to_string()).or_default().push(format!(
            "A quiz must have between {} and {} questions.",
            MIN_QUESTIONS, MAX_QUESTIONS
        ));
    }

    let mut seen_question_ids = HashSet::new();
    for (index, question) in questions.iter().enumerate() {
        let path = format!("questions[{}]", index);

        if let Some(id) = question.id.as_deref() {
            if !seen_question_ids.insert(id) {
                push(&mut fields, format!("{}.id", path), "Duplicate question id.");
            }
        }

        validate_question(question, &path, &mut fields);
    }

    if fields.is_empty() {
        Ok(())
    } else {
        Err(AppError::InvalidFields(fields))
    }
}

fn validate_question(question: &QuestionInput, path: &str, fields: &mut FieldErrors) {
    if let Err(errors) = question.validate() {
        flatten_validation_errors(&errors, path, fields);
    }

    let options_path = format!("{}.answer_options", path);
    let option_count = question.answer_options.len();
    if !(MIN_OPTIONS..=MAX_OPTIONS).contains(&option_count) {
        push(
            fields,
            options_path.clone(),
            format!(
                "A question must have between {} and {} answer options.",
                MIN_OPTIONS, MAX_OPTIONS
            ),
        );
    }

    let mut seen_option_ids = HashSet::new();
    for (index, option) in question.answer_options.iter().enumerate() {
        let option_path = format!("{}[{}]", options_path, index);
        if let Err(errors) = option.validate() {
            flatten_validation_errors(&errors, &option_path, fields);
        }
        if let Some(id) = option.id.as_deref() {
            if !seen_option_ids.insert(id) {
                push(fields, format!("{}.id", option_path), "Duplicate answer option id.");
            }
        }
    }

    let correct = question.answer_options.iter().filter(|o| o.is_correct).count();
    match question.answer_type {
        AnswerType::Single if correct != 1 => push(
            fields,
            path.to_string(),
            "A single-answer question must have exactly one correct option.",
        ),
        AnswerType::Multiple if correct < 2 => push(
            fields,
            path.to_string(),
            "A multiple-answer question must have at least two correct options.",
        ),
        _ => {}
    }
}

fn push(fields: &mut FieldErrors, path: String, message: impl Into<String>) {
    fields.entry(path).or_default().push(message.into());
}

/// Returns the `time_limit` to store: required and positive for time-limited
/// quizzes, dropped otherwise.
pub fn ensure_time_limit(is_time_limited: bool, time_limit: Option<u32>) -> AppResult<Option<u32>> {
    if !is_time_limited {
        return Ok(None);
    }

    match time_limit {
        None => Err(AppError::field(
            "time_limit",
            "This field is required when the quiz is time limited.",
        )),
        Some(0) => Err(AppError::field(
            "time_limit",
            "Ensure this value is greater than 0.",
        )),
        Some(seconds) => Ok(Some(seconds)),
    }
}

/// Builds a brand-new question tree: fresh ids everywhere, order = position.
pub fn build_questions(inputs: Vec<QuestionInput>) -> Vec<Question> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(index, input)| new_question(input, position(index)))
        .collect()
}

fn position(index: usize) -> i32 {
    index as i32 + 1
}

fn new_question(input: QuestionInput, order: i32) -> Question {
    Question {
        id: Uuid::new_v4().to_string(),
        title: input.title,
        answer_type: input.answer_type,
        order,
        photo: input.photo,
        answer_options: input.answer_options.into_iter().map(new_option).collect(),
    }
}

fn new_option(input: AnswerOptionInput) -> AnswerOption {
    AnswerOption {
        id: Uuid::new_v4().to_string(),
        text: input.text,
        is_correct: input.is_correct,
    }
}

/// Counts of what a reconciliation did, logged for every quiz update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub questions_deleted: usize,
    pub questions_updated: usize,
    pub questions_inserted: usize,
    pub options_deleted: usize,
    pub options_updated: usize,
    pub options_inserted: usize,
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "questions -{} ~{} +{}, options -{} ~{} +{}",
            self.questions_deleted,
            self.questions_updated,
            self.questions_inserted,
            self.options_deleted,
            self.options_updated,
            self.options_inserted
        )
    }
}

/// Syncs the stored questions with an incoming payload by id set difference.
///
/// Stored questions whose id is absent from the payload are dropped together
/// with their options. Incoming questions with a known id update the stored
/// one in place and keep its id; the rest are inserted with fresh ids. The
/// result follows payload order with `order` renumbered 1..N.
pub fn reconcile_questions(
    existing: Vec<Question>,
    incoming: Vec<QuestionInput>,
) -> (Vec<Question>, ReconcileSummary) {
    let mut summary = ReconcileSummary::default();

    let incoming_ids: HashSet<&str> = incoming.iter().filter_map(|q| q.id.as_deref()).collect();
    let mut stored: HashMap<String, Question> = HashMap::new();
    for question in existing {
        if incoming_ids.contains(question.id.as_str()) {
            stored.insert(question.id.clone(), question);
        } else {
            summary.questions_deleted += 1;
            summary.options_deleted += question.answer_options.len();
        }
    }

    let mut questions = Vec::with_capacity(incoming.len());
    for (index, input) in incoming.into_iter().enumerate() {
        let order = position(index);
        let known = input.id.as_deref().and_then(|id| stored.remove(id));

        match known {
            Some(current) => {
                summary.questions_updated += 1;
                let answer_options =
                    reconcile_options(current.answer_options, input.answer_options, &mut summary);
                questions.push(Question {
                    id: current.id,
                    title: input.title,
                    answer_type: input.answer_type,
                    order,
                    photo: input.photo,
                    answer_options,
                });
            }
            None => {
                summary.questions_inserted += 1;
                summary.options_inserted += input.answer_options.len();
                questions.push(new_question(input, order));
            }
        }
    }

    (questions, summary)
}

/// The same set-difference sync, one level down, for a kept question's options.
pub fn reconcile_options(
    existing: Vec<AnswerOption>,
    incoming: Vec<AnswerOptionInput>,
    summary: &mut ReconcileSummary,
) -> Vec<AnswerOption> {
    let incoming_ids: HashSet<&str> = incoming.iter().filter_map(|o| o.id.as_deref()).collect();
    let mut stored: HashMap<String, AnswerOption> = HashMap::new();
    for option in existing {
        if incoming_ids.contains(option.id.as_str()) {
            stored.insert(option.id.clone(), option);
        } else {
            summary.options_deleted += 1;
        }
    }

    incoming
        .into_iter()
        .map(|input| match input.id.as_deref().and_then(|id| stored.remove(id)) {
            Some(current) => {
                summary.options_updated += 1;
                AnswerOption {
                    id: current.id,
                    text: input.text,
                    is_correct: input.is_correct,
                }
            }
            None => {
                summary.options_inserted += 1;
                new_option(input)
            }
        })
        .collect()
}
