use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{FreelancerFilter, Pagination, ProjectFilter, ProjectStore, Store, UserStore};
use crate::{
  entities::{
    project::{Project, ProjectStatus},
    user::User,
  },
  error::{ApiError, ApiResult},
};

/// Process-local store. Every operation runs under a single lock, which gives
/// the same compare-and-swap guarantees as the SQLite store.
#[derive(Debug, Default)]
pub struct MemoryStore {
  projects: RwLock<HashMap<Uuid, Project>>,
  users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl ProjectStore for MemoryStore {
  async fn insert_project(&self, project: &Project) -> ApiResult<()> {
    self.projects.write().insert(project.id, project.clone());
    Ok(())
  }

  async fn find_project(&self, id: Uuid) -> ApiResult<Option<Project>> {
    Ok(self.projects.read().get(&id).cloned())
  }

  async fn list_projects(&self, filter: &ProjectFilter, pagination: Pagination) -> ApiResult<(Vec<Project>, i64)> {
    let mut matching: Vec<Project> = self
      .projects
      .read()
      .values()
      .filter(|project| filter.matches(project))
      .cloned()
      .collect();

    matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));

    let total = matching.len() as i64;
    let page = matching
      .into_iter()
      .skip(usize::try_from(pagination.offset()).unwrap_or(usize::MAX))
      .take(usize::try_from(pagination.limit).unwrap_or(usize::MAX))
      .collect();

    Ok((page, total))
  }

  async fn replace_project(&self, project: &Project, expected_version: i64) -> ApiResult<bool> {
    let mut projects = self.projects.write();

    match projects.get_mut(&project.id) {
      Some(stored) if stored.version == expected_version => {
        *stored = project.clone();
        Ok(true)
      },
      _ => Ok(false),
    }
  }

  async fn delete_project(&self, id: Uuid) -> ApiResult<bool> {
    Ok(self.projects.write().remove(&id).is_some())
  }

  async fn cancel_expired_projects(&self, now: DateTime<Utc>) -> ApiResult<u64> {
    let mut cancelled = 0;

    for project in self.projects.write().values_mut() {
      if project.status == ProjectStatus::Open && project.deadline < now {
        project.status = ProjectStatus::Cancelled;
        project.updated_at = now;
        project.version += 1;
        cancelled += 1;
      }
    }

    Ok(cancelled)
  }
}

#[async_trait]
impl UserStore for MemoryStore {
  async fn insert_user(&self, user: &User) -> ApiResult<()> {
    let mut users = self.users.write();

    if users.values().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
      return Err(ApiError::UserAlreadyExist(user.email.clone()));
    }

    users.insert(user.id, user.clone());
    Ok(())
  }

  async fn find_user(&self, id: Uuid) -> ApiResult<Option<User>> {
    Ok(self.users.read().get(&id).cloned())
  }

  async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<User>> {
    Ok(
      self
        .users
        .read()
        .values()
        .find(|u| u.email.eq_ignore_ascii_case(email))
        .cloned(),
    )
  }

  async fn find_users(&self, ids: &[Uuid]) -> ApiResult<Vec<User>> {
    let users = self.users.read();
    Ok(ids.iter().filter_map(|id| users.get(id).cloned()).collect())
  }

  async fn update_user(&self, user: &User) -> ApiResult<()> {
    let mut users = self.users.write();

    if users
      .values()
      .any(|u| u.id != user.id && u.email.eq_ignore_ascii_case(&user.email))
    {
      return Err(ApiError::UserAlreadyExist(user.email.clone()));
    }

    match users.get_mut(&user.id) {
      Some(stored) => {
        *stored = user.clone();
        Ok(())
      },
      None => Err(ApiError::ResourceNotFound(user.id.to_string())),
    }
  }

  async fn list_freelancers(&self, filter: &FreelancerFilter) -> ApiResult<Vec<User>> {
    let mut freelancers: Vec<User> = self
      .users
      .read()
      .values()
      .filter(|user| filter.matches(user))
      .cloned()
      .collect();

    freelancers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(freelancers)
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn ping(&self) -> ApiResult<()> {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use chrono::Duration;

  use super::*;
  use crate::entities::project::{Category, Reviews};

  fn project(created_at: DateTime<Utc>, deadline: DateTime<Utc>) -> Project {
    Project {
      id: Uuid::new_v4(),
      owner_id: Uuid::new_v4(),
      freelancer_id: None,
      title: "Inventory dashboard".to_string(),
      description: "Build a dashboard for the warehouse inventory system".to_string(),
      category: Category::WebDevelopment,
      skills: vec!["react".to_string()],
      budget: 300.0,
      final_budget: None,
      deadline,
      requirements: vec!["Charts".to_string()],
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

  #[tokio::test]
  async fn test_replace_rejects_stale_version() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let mut stored = project(now, now + Duration::days(1));
    store.insert_project(&stored).await.unwrap();

    stored.title = "First writer".to_string();
    stored.version = 1;
    assert!(store.replace_project(&stored, 0).await.unwrap());

    stored.title = "Second writer".to_string();
    stored.version = 1;
    assert!(!store.replace_project(&stored, 0).await.unwrap());

    let current = store.find_project(stored.id).await.unwrap().unwrap();
    assert_eq!(current.title, "First writer");
  }

  #[tokio::test]
  async fn test_list_is_newest_first_and_paginated() {
    let store = MemoryStore::new();
    let now = Utc::now();
    let deadline = now + Duration::days(5);

    let oldest = project(now - Duration::hours(2), deadline);
    let middle = project(now - Duration::hours(1), deadline);
    let newest = project(now, deadline);
    for p in [&middle, &oldest, &newest] {
      store.insert_project(p).await.unwrap();
    }

    let (first_page, total) = store
      .list_projects(&ProjectFilter::default(), Pagination::new(Some(1), Some(2)))
      .await
      .unwrap();
    assert_eq!(total, 3);
    assert_eq!(
      first_page.iter().map(|p| p.id).collect::<Vec<_>>(),
      vec![newest.id, middle.id]
    );

    let (second_page, _) = store
      .list_projects(&ProjectFilter::default(), Pagination::new(Some(2), Some(2)))
      .await
      .unwrap();
    assert_eq!(second_page.len(), 1);
    assert_eq!(second_page[0].id, oldest.id);
  }

  #[tokio::test]
  async fn test_cancel_expired_only_touches_open_projects() {
    let store = MemoryStore::new();
    let now = Utc::now();

    let expired = project(now - Duration::days(3), now - Duration::days(1));
    let mut running = project(now - Duration::days(3), now - Duration::days(1));
    running.status = ProjectStatus::InProgress;
    let fresh = project(now, now + Duration::days(1));
    for p in [&expired, &running, &fresh] {
      store.insert_project(p).await.unwrap();
    }

    assert_eq!(store.cancel_expired_projects(now).await.unwrap(), 1);

    let expired = store.find_project(expired.id).await.unwrap().unwrap();
    assert_eq!(expired.status, ProjectStatus::Cancelled);
    assert_eq!(expired.version, 1);
    let running = store.find_project(running.id).await.unwrap().unwrap();
    assert_eq!(running.status, ProjectStatus::InProgress);
    let fresh = store.find_project(fresh.id).await.unwrap().unwrap();
    assert_eq!(fresh.status, ProjectStatus::Open);
  }
}
