//! Database models for exercise submissions.

use crate::types::{ExerciseId, SubmissionId, UserId};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct SubmissionCreateDBRequest {
    pub exercise_id: ExerciseId,
    pub user_id: UserId,
    pub javascript_code: String,
    pub html_code: String,
    pub css_code: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionDBResponse {
    pub id: SubmissionId,
    pub exercise_id: ExerciseId,
    pub user_id: UserId,
    pub javascript_code: String,
    pub html_code: String,
    pub css_code: String,
    pub created_at: DateTime<Utc>,
}
