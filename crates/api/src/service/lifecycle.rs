//! Role-gated state transitions of a project and its embedded proposals and
//! milestones. Every rule works on an in-memory [`Project`]; persistence and
//! version checks happen in the calling mutation.
//!
//! Authorization and validation are checked before anything is mutated, so a
//! rejected call leaves the project untouched.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  entities::{
    milestone::{Milestone, MilestoneStatus},
    project::{Attachment, Category, Project, ProjectStatus, Review, Reviews},
    proposal::{Proposal, ProposalStatus},
    user::{Role, User},
  },
  error::{ApiError, ApiResult},
};

pub const COVER_LETTER_MIN_CHARS: u64 = 50;
pub const COVER_LETTER_MAX_CHARS: u64 = 1000;

/// Identity of the caller as seen by the lifecycle rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
  pub id: Uuid,
  pub role: Role,
}

impl From<&User> for Actor {
  fn from(user: &User) -> Self {
    Self {
      id: user.id,
      role: user.role(),
    }
  }
}

#[derive(Debug, Clone)]
pub struct NewProject {
  pub title: String,
  pub description: String,
  pub category: Category,
  pub skills: Vec<String>,
  pub budget: f64,
  pub deadline: DateTime<Utc>,
  pub requirements: Vec<String>,
  pub attachments: Vec<Attachment>,
}

/// Partial update of a project; `None` leaves the field as is.
#[derive(Debug, Clone, Default)]
pub struct ProjectChanges {
  pub title: Option<String>,
  pub description: Option<String>,
  pub category: Option<Category>,
  pub skills: Option<Vec<String>>,
  pub budget: Option<f64>,
  pub deadline: Option<DateTime<Utc>>,
  pub requirements: Option<Vec<String>>,
  pub attachments: Option<Vec<Attachment>>,
}

#[derive(Debug, Clone)]
pub struct NewProposal {
  pub cover_letter: String,
  pub proposed_budget: f64,
  pub estimated_time: String,
  pub attachments: Vec<Attachment>,
}

/// Outcome an owner may choose for a pending proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalDecision {
  Accepted,
  Rejected,
}

impl TryFrom<ProposalStatus> for ProposalDecision {
  type Error = ApiError;

  fn try_from(status: ProposalStatus) -> Result<Self, Self::Error> {
    match status {
      ProposalStatus::Accepted => Ok(ProposalDecision::Accepted),
      ProposalStatus::Rejected => Ok(ProposalDecision::Rejected),
      ProposalStatus::Pending => Err(ApiError::InvalidInput(
        "A proposal can only be accepted or rejected".to_string(),
      )),
    }
  }
}

#[derive(Debug, Clone)]
pub struct NewMilestone {
  pub title: String,
  pub description: String,
  pub due_date: DateTime<Utc>,
  pub amount: f64,
}

#[derive(Debug, Clone)]
pub struct NewReview {
  pub rating: u8,
  pub review: Option<String>,
}

/// Cancels an open project whose deadline has passed. Returns whether the
/// project changed and has to be written back.
pub fn sweep_deadline(project: &mut Project, now: DateTime<Utc>) -> bool {
  if project.status != ProjectStatus::Open || project.deadline >= now {
    return false;
  }

  project.status = ProjectStatus::Cancelled;
  project.updated_at = now;
  true
}

pub fn open_project(actor: &Actor, input: NewProject, now: DateTime<Utc>) -> ApiResult<Project> {
  if actor.role != Role::Entrepreneur {
    return Err(ApiError::Forbidden("Only entrepreneurs can create projects".to_string()));
  }

  require_text("title", &input.title)?;
  require_text("description", &input.description)?;
  require_list("skills", &input.skills)?;
  require_list("requirements", &input.requirements)?;
  require_amount("budget", input.budget)?;
  require_future(input.deadline, now)?;

  Ok(Project {
    id: Uuid::new_v4(),
    owner_id: actor.id,
    freelancer_id: None,
    title: input.title.trim().to_string(),
    description: input.description.trim().to_string(),
    category: input.category,
    skills: input.skills,
    budget: input.budget,
    final_budget: None,
    deadline: input.deadline,
    requirements: input.requirements,
    attachments: input.attachments,
    status: ProjectStatus::Open,
    proposals: vec![],
    milestones: vec![],
    reviews: Reviews::default(),
    created_at: now,
    updated_at: now,
    version: 0,
  })
}

pub fn apply_changes(project: &mut Project, actor: &Actor, changes: ProjectChanges, now: DateTime<Utc>) -> ApiResult<()> {
  ensure_owner(project, actor, "update this project")?;
  if project.status != ProjectStatus::Open {
    return Err(ApiError::InvalidState("Only open projects can be updated".to_string()));
  }

  if let Some(title) = &changes.title {
    require_text("title", title)?;
  }
  if let Some(description) = &changes.description {
    require_text("description", description)?;
  }
  if let Some(skills) = &changes.skills {
    require_list("skills", skills)?;
  }
  if let Some(requirements) = &changes.requirements {
    require_list("requirements", requirements)?;
  }
  if let Some(budget) = changes.budget {
    require_amount("budget", budget)?;
  }
  if let Some(deadline) = changes.deadline {
    require_future(deadline, now)?;
  }

  if let Some(title) = changes.title {
    project.title = title.trim().to_string();
  }
  if let Some(description) = changes.description {
    project.description = description.trim().to_string();
  }
  if let Some(category) = changes.category {
    project.category = category;
  }
  if let Some(skills) = changes.skills {
    project.skills = skills;
  }
  if let Some(budget) = changes.budget {
    project.budget = budget;
  }
  if let Some(deadline) = changes.deadline {
    project.deadline = deadline;
  }
  if let Some(requirements) = changes.requirements {
    project.requirements = requirements;
  }
  if let Some(attachments) = changes.attachments {
    project.attachments = attachments;
  }
  project.updated_at = now;

  Ok(())
}

/// Adds a pending proposal in front of the existing ones and returns its id.
pub fn submit_proposal(project: &mut Project, actor: &Actor, input: NewProposal, now: DateTime<Utc>) -> ApiResult<Uuid> {
  if actor.role != Role::Freelancer {
    return Err(ApiError::Forbidden("Only freelancers can submit proposals".to_string()));
  }
  if project.owner_id == actor.id {
    return Err(ApiError::Forbidden(
      "You cannot submit a proposal to your own project".to_string(),
    ));
  }
  if project.status != ProjectStatus::Open {
    return Err(ApiError::InvalidState("Project is not open for proposals".to_string()));
  }
  if project.has_proposal_from(actor.id) {
    return Err(ApiError::AlreadyApplied(project.id.to_string()));
  }

  let letter_len = input.cover_letter.trim().chars().count() as u64;
  if !(COVER_LETTER_MIN_CHARS..=COVER_LETTER_MAX_CHARS).contains(&letter_len) {
    return Err(ApiError::InvalidInput(format!(
      "Cover letter must be between {COVER_LETTER_MIN_CHARS} and {COVER_LETTER_MAX_CHARS} characters"
    )));
  }
  require_amount("proposed budget", input.proposed_budget)?;

  let proposal = Proposal {
    id: Uuid::new_v4(),
    freelancer_id: actor.id,
    cover_letter: input.cover_letter.trim().to_string(),
    proposed_budget: input.proposed_budget,
    estimated_time: input.estimated_time.trim().to_string(),
    status: ProposalStatus::Pending,
    attachments: input.attachments,
    created_at: now,
    updated_at: now,
  };
  let id = proposal.id;

  project.proposals.insert(0, proposal);
  project.updated_at = now;

  Ok(id)
}

pub fn decide_proposal(
  project: &mut Project,
  actor: &Actor,
  proposal_id: Uuid,
  decision: ProposalDecision,
  now: DateTime<Utc>,
) -> ApiResult<()> {
  ensure_owner(project, actor, "decide on proposals")?;

  let proposal = project
    .proposal(proposal_id)
    .ok_or_else(|| ApiError::ResourceNotFound(proposal_id.to_string()))?;
  if proposal.status != ProposalStatus::Pending {
    return Err(ApiError::InvalidState(format!("Proposal has already been {}", proposal.status)));
  }

  let freelancer_id = proposal.freelancer_id;
  let proposed_budget = proposal.proposed_budget;

  match decision {
    ProposalDecision::Rejected => set_proposal_status(project, proposal_id, ProposalStatus::Rejected, now),
    ProposalDecision::Accepted => {
      if project.status != ProjectStatus::Open {
        return Err(ApiError::InvalidState(
          "Proposals can only be accepted while the project is open".to_string(),
        ));
      }

      for proposal in project.proposals.iter_mut() {
        if proposal.id == proposal_id {
          proposal.status = ProposalStatus::Accepted;
          proposal.updated_at = now;
        } else if proposal.status == ProposalStatus::Pending {
          proposal.status = ProposalStatus::Rejected;
          proposal.updated_at = now;
        }
      }

      project.status = ProjectStatus::InProgress;
      project.freelancer_id = Some(freelancer_id);
      project.final_budget = Some(proposed_budget);
    },
  }
  project.updated_at = now;

  Ok(())
}

/// Appends a pending milestone and returns its id.
pub fn add_milestone(project: &mut Project, actor: &Actor, input: NewMilestone, now: DateTime<Utc>) -> ApiResult<Uuid> {
  ensure_owner(project, actor, "add milestones")?;
  if project.status.is_terminal() {
    return Err(ApiError::InvalidState(format!(
      "Milestones cannot be added to a {} project",
      project.status
    )));
  }

  require_text("title", &input.title)?;
  require_text("description", &input.description)?;
  require_amount("amount", input.amount)?;

  let milestone = Milestone {
    id: Uuid::new_v4(),
    title: input.title.trim().to_string(),
    description: input.description.trim().to_string(),
    due_date: input.due_date,
    amount: input.amount,
    status: MilestoneStatus::Pending,
    completed_at: None,
    approved_at: None,
    created_at: now,
  };
  let id = milestone.id;

  project.milestones.push(milestone);
  project.updated_at = now;

  Ok(id)
}

/// Moves a milestone to `target`. The assigned freelancer starts and completes
/// milestones, the owner approves completed ones. Approving the last
/// outstanding milestone completes the project.
pub fn update_milestone(
  project: &mut Project,
  actor: &Actor,
  milestone_id: Uuid,
  target: MilestoneStatus,
  now: DateTime<Utc>,
) -> ApiResult<()> {
  let current = project
    .milestone(milestone_id)
    .ok_or_else(|| ApiError::ResourceNotFound(milestone_id.to_string()))?
    .status;

  match target {
    MilestoneStatus::InProgress | MilestoneStatus::Completed => {
      if project.freelancer_id != Some(actor.id) {
        return Err(ApiError::Forbidden(format!(
          "Only the assigned freelancer can mark a milestone as {target}"
        )));
      }
    },
    MilestoneStatus::Approved => ensure_owner(project, actor, "approve milestones")?,
    MilestoneStatus::Pending | MilestoneStatus::Overdue => {
      return Err(ApiError::Forbidden(format!("A milestone cannot be set to {target}")));
    },
  }

  if project.status != ProjectStatus::InProgress {
    return Err(ApiError::InvalidState(
      "Milestones can only be updated while the project is in progress".to_string(),
    ));
  }

  let allowed = match target {
    MilestoneStatus::InProgress => matches!(current, MilestoneStatus::Pending | MilestoneStatus::Overdue),
    MilestoneStatus::Completed => matches!(
      current,
      MilestoneStatus::Pending | MilestoneStatus::InProgress | MilestoneStatus::Overdue
    ),
    MilestoneStatus::Approved => current == MilestoneStatus::Completed,
    MilestoneStatus::Pending | MilestoneStatus::Overdue => false,
  };
  if !allowed {
    return Err(ApiError::InvalidState(format!(
      "Milestone cannot move from {current} to {target}"
    )));
  }

  if let Some(milestone) = project.milestones.iter_mut().find(|m| m.id == milestone_id) {
    milestone.status = target;
    match target {
      MilestoneStatus::Completed => milestone.completed_at = Some(now),
      MilestoneStatus::Approved => milestone.approved_at = Some(now),
      _ => {},
    }
  }

  if project
    .milestones
    .iter()
    .all(|m| m.status == MilestoneStatus::Approved)
  {
    project.status = ProjectStatus::Completed;
  }
  project.updated_at = now;

  Ok(())
}

pub fn cancel_project(project: &mut Project, actor: &Actor, now: DateTime<Utc>) -> ApiResult<()> {
  ensure_owner(project, actor, "cancel this project")?;

  match project.status {
    ProjectStatus::Open | ProjectStatus::InProgress => {
      project.status = ProjectStatus::Cancelled;
      project.updated_at = now;
      Ok(())
    },
    status => Err(ApiError::InvalidState(format!("A {status} project cannot be cancelled"))),
  }
}

/// Records the owner's review of the freelancer or the freelancer's review of
/// the owner, depending on who the actor is.
pub fn leave_review(project: &mut Project, actor: &Actor, input: NewReview, now: DateTime<Utc>) -> ApiResult<()> {
  if project.status != ProjectStatus::Completed {
    return Err(ApiError::InvalidState(
      "Reviews can only be left on completed projects".to_string(),
    ));
  }

  let (slot, side) = if project.owner_id == actor.id {
    (&mut project.reviews.freelancer, "freelancer")
  } else if project.freelancer_id == Some(actor.id) {
    (&mut project.reviews.client, "client")
  } else {
    return Err(ApiError::Forbidden(
      "Only the owner and the assigned freelancer can review this project".to_string(),
    ));
  };

  if slot.is_some() {
    return Err(ApiError::AlreadyReviewed(side.to_string()));
  }
  if !(1..=5).contains(&input.rating) {
    return Err(ApiError::InvalidInput("Rating must be between 1 and 5".to_string()));
  }

  *slot = Some(Review {
    author_id: actor.id,
    rating: input.rating,
    review: input.review.map(|text| text.trim().to_string()).filter(|text| !text.is_empty()),
    created_at: now,
  });
  project.updated_at = now;

  Ok(())
}

pub fn ensure_owner(project: &Project, actor: &Actor, action: &str) -> ApiResult<()> {
  if project.owner_id == actor.id {
    Ok(())
  } else {
    Err(ApiError::Forbidden(format!("Only the project owner can {action}")))
  }
}

fn set_proposal_status(project: &mut Project, proposal_id: Uuid, status: ProposalStatus, now: DateTime<Utc>) {
  if let Some(proposal) = project.proposals.iter_mut().find(|p| p.id == proposal_id) {
    proposal.status = status;
    proposal.updated_at = now;
  }
}

fn require_text(field: &str, value: &str) -> ApiResult<()> {
  if value.trim().is_empty() {
    return Err(ApiError::InvalidInput(format!("{field} is required")));
  }
  Ok(())
}

fn require_list(field: &str, values: &[String]) -> ApiResult<()> {
  if values.is_empty() || values.iter().any(|v| v.trim().is_empty()) {
    return Err(ApiError::InvalidInput(format!("{field} must be a non-empty list")));
  }
  Ok(())
}

fn require_amount(field: &str, value: f64) -> ApiResult<()> {
  if !value.is_finite() || value < 0.0 {
    return Err(ApiError::InvalidInput(format!("{field} must be a non-negative number")));
  }
  Ok(())
}

fn require_future(deadline: DateTime<Utc>, now: DateTime<Utc>) -> ApiResult<()> {
  if deadline <= now {
    return Err(ApiError::InvalidInput("deadline must be in the future".to_string()));
  }
  Ok(())
}
