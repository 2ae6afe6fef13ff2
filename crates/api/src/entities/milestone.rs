use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum MilestoneStatus {
  Pending,
  #[serde(alias = "in_progress")]
  InProgress,
  Completed,
  Approved,
  Overdue,
}

impl fmt::Display for MilestoneStatus {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      MilestoneStatus::Pending => write!(f, "pending"),
      MilestoneStatus::InProgress => write!(f, "in-progress"),
      MilestoneStatus::Completed => write!(f, "completed"),
      MilestoneStatus::Approved => write!(f, "approved"),
      MilestoneStatus::Overdue => write!(f, "overdue"),
    }
  }
}

impl FromStr for MilestoneStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(MilestoneStatus::Pending),
      "in-progress" | "in_progress" => Ok(MilestoneStatus::InProgress),
      "completed" => Ok(MilestoneStatus::Completed),
      "approved" => Ok(MilestoneStatus::Approved),
      "overdue" => Ok(MilestoneStatus::Overdue),
      _ => Err(format!("'{}' is not a valid variant", s)),
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
  pub id: Uuid,
  pub title: String,
  pub description: String,
  pub due_date: DateTime<Utc>,
  #[serde(alias = "payment")]
  pub amount: f64,
  pub status: MilestoneStatus,
  pub completed_at: Option<DateTime<Utc>>,
  pub approved_at: Option<DateTime<Utc>>,
  pub created_at: DateTime<Utc>,
}
