use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{project::Attachment, user::UserSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
  Pending,
  Accepted,
  Rejected,
}

impl fmt::Display for ProposalStatus {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      ProposalStatus::Pending => write!(f, "pending"),
      ProposalStatus::Accepted => write!(f, "accepted"),
      ProposalStatus::Rejected => write!(f, "rejected"),
    }
  }
}

impl FromStr for ProposalStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(ProposalStatus::Pending),
      "accepted" => Ok(ProposalStatus::Accepted),
      "rejected" => Ok(ProposalStatus::Rejected),
      _ => Err(format!("'{}' is not a valid variant", s)),
    }
  }
}

/// A freelancer's bid, embedded in its project document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
  pub id: Uuid,
  pub freelancer_id: Uuid,
  pub cover_letter: String,
  pub proposed_budget: f64,
  pub estimated_time: String,
  pub status: ProposalStatus,
  #[serde(default)]
  pub attachments: Vec<Attachment>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProposalView {
  pub id: Uuid,
  pub freelancer: UserSummary,
  pub cover_letter: String,
  pub proposed_budget: f64,
  pub estimated_time: String,
  pub status: ProposalStatus,
  pub attachments: Vec<Attachment>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl ProposalView {
  pub fn new(proposal: &Proposal, freelancer: UserSummary) -> Self {
    Self {
      id: proposal.id,
      freelancer,
      cover_letter: proposal.cover_letter.clone(),
      proposed_budget: proposal.proposed_budget,
      estimated_time: proposal.estimated_time.clone(),
      status: proposal.status,
      attachments: proposal.attachments.clone(),
      created_at: proposal.created_at,
      updated_at: proposal.updated_at,
    }
  }
}
