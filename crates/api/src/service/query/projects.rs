use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use super::calculate_total_pages;
use crate::{
  entities::{
    project::{Project, ProjectPage, ProjectStatus, ProjectView},
    user::UserSummary,
  },
  error::ApiResult,
  service::load_project,
  store::{Pagination, ProjectFilter, Store},
};

pub const SIMILAR_PROJECTS_LIMIT: i64 = 5;

/// Lists projects matching `filter`, newest first
///
/// Expired open projects are cancelled first so that the page and the
/// total count agree with the deadline rule.
pub async fn list(
  store: &dyn Store,
  filter: &ProjectFilter,
  pagination: Pagination,
  now: DateTime<Utc>,
) -> ApiResult<ProjectPage> {
  let swept = store.cancel_expired_projects(now).await?;
  if swept > 0 {
    debug!("Cancelled {} projects past their deadline", swept);
  }

  let (projects, total) = store.list_projects(filter, pagination).await?;

  Ok(ProjectPage {
    projects: present_many(store, projects).await?,
    total,
    pages: calculate_total_pages(total, pagination.limit),
    current_page: pagination.page,
  })
}

/// Finds a project by id, applying the deadline sweep
///
/// # Errors
/// - ResourceNotFound if project doesn't exist
pub async fn find_by_id(store: &dyn Store, id: Uuid, now: DateTime<Utc>) -> ApiResult<Project> {
  load_project(store, id, now).await
}

/// Open projects of the same category, excluding the project itself.
pub async fn similar(store: &dyn Store, id: Uuid, now: DateTime<Utc>) -> ApiResult<Vec<Project>> {
  let project = load_project(store, id, now).await?;
  store.cancel_expired_projects(now).await?;

  let filter = ProjectFilter {
    category: Some(project.category),
    status: Some(ProjectStatus::Open),
    exclude_id: Some(project.id),
    ..ProjectFilter::default()
  };
  let (projects, _) = store
    .list_projects(&filter, Pagination::new(Some(1), Some(SIMILAR_PROJECTS_LIMIT)))
    .await?;

  Ok(projects)
}

/// Resolves the users a project refers to and builds its api view.
pub async fn present(store: &dyn Store, project: Project) -> ApiResult<ProjectView> {
  let summaries = summaries(store, project.referenced_users()).await?;
  Ok(view(project, &summaries))
}

pub async fn present_many(store: &dyn Store, projects: Vec<Project>) -> ApiResult<Vec<ProjectView>> {
  let mut ids: Vec<Uuid> = projects.iter().flat_map(Project::referenced_users).collect();
  ids.sort_unstable();
  ids.dedup();

  let summaries = summaries(store, ids).await?;
  Ok(projects.into_iter().map(|project| view(project, &summaries)).collect())
}

async fn summaries(store: &dyn Store, ids: Vec<Uuid>) -> ApiResult<HashMap<Uuid, UserSummary>> {
  Ok(
    store
      .find_users(&ids)
      .await?
      .iter()
      .map(|user| (user.id, UserSummary::from(user)))
      .collect(),
  )
}

fn view(project: Project, summaries: &HashMap<Uuid, UserSummary>) -> ProjectView {
  ProjectView::new(project, |id| {
    summaries.get(&id).cloned().unwrap_or_else(|| UserSummary::missing(id))
  })
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::{
    entities::{
      project::{Category, Reviews},
      user::{Profile, Role, RoleDetails, User},
    },
    store::{MemoryStore, ProjectStore, UserStore},
  };

  fn project(owner_id: Uuid, category: Category, created_at: DateTime<Utc>, deadline: DateTime<Utc>) -> Project {
    Project {
      id: Uuid::new_v4(),
      owner_id,
      freelancer_id: None,
      title: "Quarterly report".to_string(),
      description: "Write the quarterly investor report".to_string(),
      category,
      skills: vec!["Writing".to_string()],
      budget: 250.0,
      final_budget: None,
      deadline,
      requirements: vec!["Plain English".to_string()],
      attachments: vec![],
      status: ProjectStatus::Open,
      proposals: vec![],
      milestones: vec![],
      reviews: Reviews::default(),
      created_at,
      updated_at: created_at,
      version: 0,
    }
  }

  fn owner() -> User {
    let now = Utc::now();
    User {
      id: Uuid::new_v4(),
      first_name: "Margaret".to_string(),
      last_name: "Hamilton".to_string(),
      email: "margaret@example.com".to_string(),
      password: "hash".to_string(),
      profile: Profile {
        avatar: Some("https://cdn.example.com/m.png".to_string()),
        ..Profile::default()
      },
      details: RoleDetails::for_role(Role::Entrepreneur),
      is_verified: true,
      created_at: now,
      updated_at: now,
    }
  }

  #[tokio::test]
  async fn test_list_sweeps_expired_projects_before_counting() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let owner = owner();
    store.insert_user(&owner).await.unwrap();

    let expired = project(owner.id, Category::ContentWriting, now - Duration::days(10), now - Duration::days(1));
    let live = project(owner.id, Category::ContentWriting, now, now + Duration::days(1));
    store.insert_project(&expired).await.unwrap();
    store.insert_project(&live).await.unwrap();

    let open = ProjectFilter {
      status: Some(ProjectStatus::Open),
      ..ProjectFilter::default()
    };
    let page = list(&store, &open, Pagination::default(), now).await.unwrap();

    assert_eq!(page.total, 1);
    assert_eq!(page.pages, 1);
    assert_eq!(page.current_page, 1);
    assert_eq!(page.projects[0].id, live.id);
    assert_eq!(page.projects[0].owner.name, "Margaret Hamilton");
  }

  #[tokio::test]
  async fn test_find_by_id_observes_deadline() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let stale = project(Uuid::new_v4(), Category::Other, now - Duration::days(3), now - Duration::hours(1));
    store.insert_project(&stale).await.unwrap();

    let found = find_by_id(&store, stale.id, now).await.unwrap();
    assert_eq!(found.status, ProjectStatus::Cancelled);

    let stored = store.find_project(stale.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ProjectStatus::Cancelled);
    assert_eq!(stored.version, 1);
  }

  #[tokio::test]
  async fn test_similar_projects() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let deadline = now + Duration::days(3);
    let owner_id = Uuid::new_v4();

    let base = project(owner_id, Category::DataScience, now, deadline);
    store.insert_project(&base).await.unwrap();
    for minutes in 1..=6 {
      let sibling = project(owner_id, Category::DataScience, now - Duration::minutes(minutes), deadline);
      store.insert_project(&sibling).await.unwrap();
    }
    let unrelated = project(owner_id, Category::LegalServices, now, deadline);
    store.insert_project(&unrelated).await.unwrap();

    let similar = similar(&store, base.id, now).await.unwrap();

    assert_eq!(similar.len(), SIMILAR_PROJECTS_LIMIT as usize);
    assert!(similar.iter().all(|p| p.category == Category::DataScience && p.id != base.id));
    assert!(similar.windows(2).all(|w| w[0].created_at >= w[1].created_at));
  }

  #[tokio::test]
  async fn test_present_tolerates_missing_users() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let orphan = project(Uuid::new_v4(), Category::Other, now, now + Duration::days(1));

    let view = present(&store, orphan.clone()).await.unwrap();
    assert_eq!(view.owner, UserSummary::missing(orphan.owner_id));
    assert_eq!(view.proposal_count, 0);
    assert_eq!(view.completion_percentage, 0);
  }
}
