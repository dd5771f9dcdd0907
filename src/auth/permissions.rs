use crate::{
    errors::{AppError, AppResult},
    models::domain::Quiz,
};

pub fn is_creator(actor_id: &str, quiz: &Quiz) -> bool {
    quiz.creator_id == actor_id
}

pub fn require_creator(actor_id: &str, quiz: &Quiz) -> AppResult<()> {
    if !is_creator(actor_id, quiz) {
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action.".to_string(),
        ));
    }
    Ok(())
}
