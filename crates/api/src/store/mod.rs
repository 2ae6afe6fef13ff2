use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  entities::{
    project::{Category, Project, ProjectStatus},
    user::{Role, User},
  },
  error::ApiResult,
};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
  pub page: i64,
  pub limit: i64,
}

impl Pagination {
  /// Clamps the requested page to `>= 1` and the size to `1..=MAX_PAGE_SIZE`.
  pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
    Self {
      page: page.unwrap_or(DEFAULT_PAGE).max(1),
      limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
    }
  }

  pub fn unbounded() -> Self {
    Self {
      page: 1,
      limit: i64::MAX,
    }
  }

  pub fn offset(&self) -> i64 {
    (self.page - 1).saturating_mul(self.limit)
  }
}

impl Default for Pagination {
  fn default() -> Self {
    Self::new(None, None)
  }
}

/// Conjunctive project filter; `None`/empty members do not constrain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectFilter {
  pub category: Option<Category>,
  pub status: Option<ProjectStatus>,
  pub min_budget: Option<f64>,
  pub max_budget: Option<f64>,
  /// Matches projects requiring any of these skills, ignoring case.
  pub skills: Vec<String>,
  /// Case-insensitive substring of the title, the description or a skill.
  pub search: Option<String>,
  pub owner_id: Option<Uuid>,
  pub freelancer_id: Option<Uuid>,
  pub exclude_id: Option<Uuid>,
}

impl ProjectFilter {
  pub fn matches(&self, project: &Project) -> bool {
    if self.category.is_some_and(|category| project.category != category) {
      return false;
    }
    if self.status.is_some_and(|status| project.status != status) {
      return false;
    }
    if self.min_budget.is_some_and(|min| project.budget < min) {
      return false;
    }
    if self.max_budget.is_some_and(|max| project.budget > max) {
      return false;
    }
    if self.owner_id.is_some_and(|owner| project.owner_id != owner) {
      return false;
    }
    if self.freelancer_id.is_some() && project.freelancer_id != self.freelancer_id {
      return false;
    }
    if self.exclude_id.is_some_and(|id| project.id == id) {
      return false;
    }
    if !self.skills.is_empty()
      && !project
        .skills
        .iter()
        .any(|skill| self.skills.iter().any(|wanted| wanted.eq_ignore_ascii_case(skill)))
    {
      return false;
    }
    if let Some(search) = self.search.as_deref() {
      let needle = search.to_lowercase();
      let hit = project.title.to_lowercase().contains(&needle)
        || project.description.to_lowercase().contains(&needle)
        || project.skills.iter().any(|skill| skill.to_lowercase().contains(&needle));
      if !hit {
        return false;
      }
    }
    true
  }
}

/// Freelancer directory filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FreelancerFilter {
  pub skills: Vec<String>,
  pub max_hourly_rate: Option<f64>,
}

impl FreelancerFilter {
  pub fn matches(&self, user: &User) -> bool {
    if user.role() != Role::Freelancer {
      return false;
    }
    if let Some(max) = self.max_hourly_rate {
      if !user.hourly_rate().is_some_and(|rate| rate <= max) {
        return false;
      }
    }
    self.skills.is_empty()
      || user
        .profile
        .skills
        .iter()
        .any(|skill| self.skills.iter().any(|wanted| wanted.eq_ignore_ascii_case(skill)))
  }
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
  async fn insert_project(&self, project: &Project) -> ApiResult<()>;

  async fn find_project(&self, id: Uuid) -> ApiResult<Option<Project>>;

  /// Returns one page of matching projects, newest first, and the total match count.
  async fn list_projects(&self, filter: &ProjectFilter, pagination: Pagination) -> ApiResult<(Vec<Project>, i64)>;

  /// Writes `project` only if the stored version still equals `expected_version`.
  /// Returns `false` when the document changed underneath or disappeared.
  async fn replace_project(&self, project: &Project, expected_version: i64) -> ApiResult<bool>;

  async fn delete_project(&self, id: Uuid) -> ApiResult<bool>;

  /// Cancels every open project whose deadline is before `now`.
  async fn cancel_expired_projects(&self, now: DateTime<Utc>) -> ApiResult<u64>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
  /// Fails with `UserAlreadyExist` when the email is taken.
  async fn insert_user(&self, user: &User) -> ApiResult<()>;

  async fn find_user(&self, id: Uuid) -> ApiResult<Option<User>>;

  async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>>;

  async fn find_users(&self, ids: &[Uuid]) -> ApiResult<Vec<User>>;

  async fn update_user(&self, user: &User) -> ApiResult<()>;

  async fn list_freelancers(&self, filter: &FreelancerFilter) -> ApiResult<Vec<User>>;
}

/// Persistence handle injected into the api.
#[async_trait]
pub trait Store: ProjectStore + UserStore {
  async fn ping(&self) -> ApiResult<()>;
}
