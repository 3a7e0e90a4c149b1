//! Project types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::domain::validation::not_blank;

/// A project scoping traces, spans, and automation rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Project create payload
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProjectWrite {
    #[validate(custom(function = "not_blank"))]
    pub name: String,
}
