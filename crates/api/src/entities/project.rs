use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
  milestone::{Milestone, MilestoneStatus},
  proposal::{Proposal, ProposalView},
  user::UserSummary,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum Category {
  #[serde(rename = "Web Development")]
  WebDevelopment,
  #[serde(rename = "Mobile Development")]
  MobileDevelopment,
  #[serde(rename = "UI/UX Design")]
  UiUxDesign,
  #[serde(rename = "Data Science")]
  DataScience,
  #[serde(rename = "Digital Marketing")]
  DigitalMarketing,
  #[serde(rename = "Content Writing")]
  ContentWriting,
  #[serde(rename = "Business Strategy")]
  BusinessStrategy,
  #[serde(rename = "Financial Planning")]
  FinancialPlanning,
  #[serde(rename = "Legal Services")]
  LegalServices,
  #[serde(rename = "Other")]
  Other,
}

impl Category {
  pub const ALL: [Category; 10] = [
    Category::WebDevelopment,
    Category::MobileDevelopment,
    Category::UiUxDesign,
    Category::DataScience,
    Category::DigitalMarketing,
    Category::ContentWriting,
    Category::BusinessStrategy,
    Category::FinancialPlanning,
    Category::LegalServices,
    Category::Other,
  ];

  pub fn label(&self) -> &'static str {
    match self {
      Category::WebDevelopment => "Web Development",
      Category::MobileDevelopment => "Mobile Development",
      Category::UiUxDesign => "UI/UX Design",
      Category::DataScience => "Data Science",
      Category::DigitalMarketing => "Digital Marketing",
      Category::ContentWriting => "Content Writing",
      Category::BusinessStrategy => "Business Strategy",
      Category::FinancialPlanning => "Financial Planning",
      Category::LegalServices => "Legal Services",
      Category::Other => "Other",
    }
  }
}

impl fmt::Display for Category {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for Category {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Category::ALL
      .into_iter()
      .find(|category| category.label().eq_ignore_ascii_case(s))
      .ok_or_else(|| format!("'{}' is not a valid category", s))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectStatus {
  Open,
  #[serde(alias = "in_progress")]
  InProgress,
  Completed,
  Cancelled,
}

impl ProjectStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, ProjectStatus::Completed | ProjectStatus::Cancelled)
  }
}

impl fmt::Display for ProjectStatus {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      ProjectStatus::Open => write!(f, "open"),
      ProjectStatus::InProgress => write!(f, "in-progress"),
      ProjectStatus::Completed => write!(f, "completed"),
      ProjectStatus::Cancelled => write!(f, "cancelled"),
    }
  }
}

impl FromStr for ProjectStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "open" => Ok(ProjectStatus::Open),
      "in-progress" | "in_progress" => Ok(ProjectStatus::InProgress),
      "completed" => Ok(ProjectStatus::Completed),
      "cancelled" => Ok(ProjectStatus::Cancelled),
      _ => Err(format!("'{}' is not a valid variant", s)),
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
  pub name: String,
  pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Review {
  pub author_id: Uuid,
  pub rating: u8,
  pub review: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// Reviews left once a project is completed: `freelancer` is the owner's
/// review of the assigned freelancer, `client` the freelancer's review of the owner.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct Reviews {
  pub freelancer: Option<Review>,
  pub client: Option<Review>,
}

/// Project document. Proposals and milestones are embedded and persisted
/// together with the project under a single `version`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Project {
  pub id: Uuid,
  pub owner_id: Uuid,
  pub freelancer_id: Option<Uuid>,
  pub title: String,
  pub description: String,
  pub category: Category,
  pub skills: Vec<String>,
  pub budget: f64,
  pub final_budget: Option<f64>,
  pub deadline: DateTime<Utc>,
  pub requirements: Vec<String>,
  #[serde(default)]
  pub attachments: Vec<Attachment>,
  pub status: ProjectStatus,
  #[serde(default, alias = "applications")]
  pub proposals: Vec<Proposal>,
  #[serde(default)]
  pub milestones: Vec<Milestone>,
  #[serde(default)]
  pub reviews: Reviews,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub version: i64,
}

impl Project {
  pub fn proposal(&self, id: Uuid) -> Option<&Proposal> {
    self.proposals.iter().find(|p| p.id == id)
  }

  pub fn milestone(&self, id: Uuid) -> Option<&Milestone> {
    self.milestones.iter().find(|m| m.id == id)
  }

  pub fn has_proposal_from(&self, freelancer_id: Uuid) -> bool {
    self.proposals.iter().any(|p| p.freelancer_id == freelancer_id)
  }

  pub fn completion_percentage(&self) -> u8 {
    if self.milestones.is_empty() {
      return 0;
    }

    let done = self
      .milestones
      .iter()
      .filter(|m| matches!(m.status, MilestoneStatus::Completed | MilestoneStatus::Approved))
      .count();

    ((done as f64 / self.milestones.len() as f64) * 100.0).round() as u8
  }

  /// Ids of every user the project refers to.
  pub fn referenced_users(&self) -> Vec<Uuid> {
    let mut ids = vec![self.owner_id];
    ids.extend(self.freelancer_id);
    ids.extend(self.proposals.iter().map(|p| p.freelancer_id));
    ids.sort_unstable();
    ids.dedup();
    ids
  }
}

/// Project as returned by the api, with user references resolved.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectView {
  pub id: Uuid,
  pub owner: UserSummary,
  pub freelancer: Option<UserSummary>,
  pub title: String,
  pub description: String,
  pub category: Category,
  pub skills: Vec<String>,
  pub budget: f64,
  pub final_budget: Option<f64>,
  pub deadline: DateTime<Utc>,
  pub requirements: Vec<String>,
  pub attachments: Vec<Attachment>,
  pub status: ProjectStatus,
  pub proposals: Vec<ProposalView>,
  pub milestones: Vec<Milestone>,
  pub reviews: Reviews,
  pub proposal_count: usize,
  pub completion_percentage: u8,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl ProjectView {
  /// Builds the view, resolving user ids through `resolve`.
  pub fn new(project: Project, resolve: impl Fn(Uuid) -> UserSummary) -> Self {
    let proposals = project
      .proposals
      .iter()
      .map(|p| ProposalView::new(p, resolve(p.freelancer_id)))
      .collect();

    Self {
      id: project.id,
      owner: resolve(project.owner_id),
      freelancer: project.freelancer_id.map(&resolve),
      proposal_count: project.proposals.len(),
      completion_percentage: project.completion_percentage(),
      title: project.title,
      description: project.description,
      category: project.category,
      skills: project.skills,
      budget: project.budget,
      final_budget: project.final_budget,
      deadline: project.deadline,
      requirements: project.requirements,
      attachments: project.attachments,
      status: project.status,
      proposals,
      milestones: project.milestones,
      reviews: project.reviews,
      created_at: project.created_at,
      updated_at: project.updated_at,
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPage {
  pub projects: Vec<ProjectView>,
  pub total: i64,
  pub pages: i64,
  pub current_page: i64,
}
