use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
  entities::{
    project::{Project, ProjectStatus},
    user::{Role, User},
  },
  error::{ApiError, ApiResult},
  store::{FreelancerFilter, Pagination, ProjectFilter, Store},
};

const RECENT_PROJECTS_LIMIT: usize = 5;

/// Finds a user by their ID
///
/// # Returns
/// Optional User if found
pub async fn find_by_id(store: &dyn Store, id: Uuid) -> ApiResult<Option<User>> {
  store.find_user(id).await
}

/// Same as [`find_by_id`] but a missing user is an error.
pub async fn get_by_id(store: &dyn Store, id: Uuid) -> ApiResult<User> {
  find_by_id(store, id)
    .await?
    .ok_or_else(|| ApiError::ResourceNotFound(id.to_string()))
}

/// Freelancers having any of the requested skills and an hourly rate no
/// greater than the requested one, newest first.
pub async fn list_freelancers(store: &dyn Store, filter: &FreelancerFilter) -> ApiResult<Vec<User>> {
  store.list_freelancers(filter).await
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
  pub id: Uuid,
  pub title: String,
  pub status: ProjectStatus,
  pub budget: f64,
  pub final_budget: Option<f64>,
  pub deadline: DateTime<Utc>,
  pub proposal_count: usize,
  pub created_at: DateTime<Utc>,
}

impl From<&Project> for ProjectSummary {
  fn from(project: &Project) -> Self {
    Self {
      id: project.id,
      title: project.title.clone(),
      status: project.status,
      budget: project.budget,
      final_budget: project.final_budget,
      deadline: project.deadline,
      proposal_count: project.proposals.len(),
      created_at: project.created_at,
    }
  }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FreelancerStats {
  pub active_projects: usize,
  pub completed_projects: usize,
  pub total_earnings: f64,
  pub recent_projects: Vec<ProjectSummary>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EntrepreneurStats {
  pub posted_projects: usize,
  pub active_projects: usize,
  pub total_budget: f64,
  pub recent_projects: Vec<ProjectSummary>,
}

/// Investors have no investment model yet, every figure is zero.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InvestorStats {
  pub active_investments: usize,
  pub total_invested: f64,
  pub portfolio_companies: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlatformStats {
  pub total_projects: i64,
  pub open_projects: i64,
  pub in_progress_projects: i64,
  pub completed_projects: i64,
  pub cancelled_projects: i64,
}

/// Dashboard figures, shaped by the caller's role.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum DashboardStats {
  Freelancer(FreelancerStats),
  Entrepreneur(EntrepreneurStats),
  Investor(InvestorStats),
  Admin(PlatformStats),
}

pub async fn dashboard_stats(store: &dyn Store, user: &User, now: DateTime<Utc>) -> ApiResult<DashboardStats> {
  store.cancel_expired_projects(now).await?;

  match user.role() {
    Role::Freelancer => {
      let filter = ProjectFilter {
        freelancer_id: Some(user.id),
        ..ProjectFilter::default()
      };
      let (projects, _) = store.list_projects(&filter, Pagination::unbounded()).await?;
      Ok(DashboardStats::Freelancer(freelancer_stats(&projects)))
    },
    Role::Entrepreneur => {
      let filter = ProjectFilter {
        owner_id: Some(user.id),
        ..ProjectFilter::default()
      };
      let (projects, _) = store.list_projects(&filter, Pagination::unbounded()).await?;
      Ok(DashboardStats::Entrepreneur(entrepreneur_stats(&projects)))
    },
    Role::Investor => Ok(DashboardStats::Investor(InvestorStats::default())),
    Role::Admin => {
      let (open_projects, in_progress_projects, completed_projects, cancelled_projects) = tokio::try_join!(
        count_with_status(store, ProjectStatus::Open),
        count_with_status(store, ProjectStatus::InProgress),
        count_with_status(store, ProjectStatus::Completed),
        count_with_status(store, ProjectStatus::Cancelled)
      )?;

      Ok(DashboardStats::Admin(PlatformStats {
        total_projects: open_projects + in_progress_projects + completed_projects + cancelled_projects,
        open_projects,
        in_progress_projects,
        completed_projects,
        cancelled_projects,
      }))
    },
  }
}

/// `projects` are expected newest first.
fn freelancer_stats(projects: &[Project]) -> FreelancerStats {
  let completed: Vec<&Project> = projects
    .iter()
    .filter(|p| p.status == ProjectStatus::Completed)
    .collect();

  FreelancerStats {
    active_projects: count(projects, ProjectStatus::InProgress),
    completed_projects: completed.len(),
    total_earnings: completed.iter().map(|p| p.final_budget.unwrap_or(p.budget)).sum(),
    recent_projects: recent(projects),
  }
}

fn entrepreneur_stats(projects: &[Project]) -> EntrepreneurStats {
  EntrepreneurStats {
    posted_projects: projects.len(),
    active_projects: count(projects, ProjectStatus::Open) + count(projects, ProjectStatus::InProgress),
    total_budget: projects.iter().map(|p| p.budget).sum(),
    recent_projects: recent(projects),
  }
}

fn count(projects: &[Project], status: ProjectStatus) -> usize {
  projects.iter().filter(|p| p.status == status).count()
}

fn recent(projects: &[Project]) -> Vec<ProjectSummary> {
  projects
    .iter()
    .take(RECENT_PROJECTS_LIMIT)
    .map(ProjectSummary::from)
    .collect()
}

async fn count_with_status(store: &dyn Store, status: ProjectStatus) -> ApiResult<i64> {
  let filter = ProjectFilter {
    status: Some(status),
    ..ProjectFilter::default()
  };
  let (_, total) = store.list_projects(&filter, Pagination::new(Some(1), Some(1))).await?;
  Ok(total)
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::{
    entities::{
      project::{Category, Reviews},
      user::{Profile, RoleDetails},
    },
    store::{MemoryStore, ProjectStore},
  };

  fn user(role: Role) -> User {
    let now = Utc::now();
    User {
      id: Uuid::new_v4(),
      first_name: "Barbara".to_string(),
      last_name: "Liskov".to_string(),
      email: format!("{}@example.com", Uuid::new_v4()),
      password: "hash".to_string(),
      profile: Profile::default(),
      details: RoleDetails::for_role(role),
      is_verified: false,
      created_at: now,
      updated_at: now,
    }
  }

  fn project(owner_id: Uuid, freelancer_id: Option<Uuid>, status: ProjectStatus, budget: f64, age: i64) -> Project {
    let now = Utc::now();
    let created_at = now - Duration::hours(age);
    Project {
      id: Uuid::new_v4(),
      owner_id,
      freelancer_id,
      title: format!("Project {age}"),
      description: "Statistics fixture".to_string(),
      category: Category::BusinessStrategy,
      skills: vec!["Excel".to_string()],
      budget,
      final_budget: freelancer_id.map(|_| budget - 100.0),
      deadline: now + Duration::days(30),
      requirements: vec!["Report".to_string()],
      attachments: vec![],
      status,
      proposals: vec![],
      milestones: vec![],
      reviews: Reviews::default(),
      created_at,
      updated_at: created_at,
      version: 0,
    }
  }

  #[tokio::test]
  async fn test_freelancer_stats() {
    let store = MemoryStore::new();
    let owner = user(Role::Entrepreneur);
    let freelancer = user(Role::Freelancer);

    let fixtures = [
      project(owner.id, Some(freelancer.id), ProjectStatus::InProgress, 1000.0, 1),
      project(owner.id, Some(freelancer.id), ProjectStatus::Completed, 600.0, 2),
      project(owner.id, Some(freelancer.id), ProjectStatus::Completed, 400.0, 3),
      project(owner.id, None, ProjectStatus::Open, 5000.0, 4),
    ];
    for p in &fixtures {
      store.insert_project(p).await.unwrap();
    }

    let DashboardStats::Freelancer(stats) = dashboard_stats(&store, &freelancer, Utc::now()).await.unwrap() else {
      panic!("expected freelancer stats");
    };

    assert_eq!(stats.active_projects, 1);
    assert_eq!(stats.completed_projects, 2);
    assert_eq!(stats.total_earnings, 800.0);
    assert_eq!(stats.recent_projects.len(), 3);
    assert_eq!(stats.recent_projects[0].id, fixtures[0].id);
  }

  #[tokio::test]
  async fn test_entrepreneur_and_admin_stats() {
    let store = MemoryStore::new();
    let owner = user(Role::Entrepreneur);

    for (status, age) in [
      (ProjectStatus::Open, 1),
      (ProjectStatus::InProgress, 2),
      (ProjectStatus::Cancelled, 3),
    ] {
      store
        .insert_project(&project(owner.id, None, status, 100.0, age))
        .await
        .unwrap();
    }
    store
      .insert_project(&project(Uuid::new_v4(), None, ProjectStatus::Completed, 100.0, 4))
      .await
      .unwrap();

    let DashboardStats::Entrepreneur(stats) = dashboard_stats(&store, &owner, Utc::now()).await.unwrap() else {
      panic!("expected entrepreneur stats");
    };
    assert_eq!(stats.posted_projects, 3);
    assert_eq!(stats.active_projects, 2);
    assert_eq!(stats.total_budget, 300.0);

    let DashboardStats::Admin(platform) = dashboard_stats(&store, &user(Role::Admin), Utc::now()).await.unwrap() else {
      panic!("expected platform stats");
    };
    assert_eq!(platform.total_projects, 4);
    assert_eq!(platform.completed_projects, 1);
    assert_eq!(platform.cancelled_projects, 1);
  }

  #[test]
  fn test_stats_are_tagged_by_role() {
    let value = serde_json::to_value(DashboardStats::Investor(InvestorStats::default())).unwrap();

    assert_eq!(value["role"], "investor");
    assert_eq!(value["activeInvestments"], 0);
  }
}
