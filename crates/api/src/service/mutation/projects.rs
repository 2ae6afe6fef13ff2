use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::{
  entities::project::Project,
  error::{ApiError, ApiResult},
  service::{
    commit,
    lifecycle::{self, Actor, NewProject, NewReview, ProjectChanges},
    load_project,
  },
  store::Store,
};

/// Creates a new open project owned by `actor`
///
/// # Errors
/// - Forbidden if the actor is not an entrepreneur
/// - InvalidInput for a negative budget, a past deadline or empty lists
pub async fn create(store: &dyn Store, actor: &Actor, params: NewProject, now: DateTime<Utc>) -> ApiResult<Project> {
  let project = lifecycle::open_project(actor, params, now)?;
  store.insert_project(&project).await?;

  info!("Project {} created by {}", project.id, actor.id);

  Ok(project)
}

/// Applies a partial update to an open project
///
/// # Errors
/// - ResourceNotFound if project doesn't exist
/// - Forbidden if the actor is not the owner
/// - InvalidState if the project is no longer open
/// - ConcurrentModification if the project changed since it was loaded
pub async fn update(
  store: &dyn Store,
  id: Uuid,
  actor: &Actor,
  changes: ProjectChanges,
  now: DateTime<Utc>,
) -> ApiResult<Project> {
  let mut project = load_project(store, id, now).await?;

  lifecycle::apply_changes(&mut project, actor, changes, now)?;
  commit(store, &mut project).await?;

  Ok(project)
}

/// Deletes a project together with its proposals and milestones
///
/// # Errors
/// - ResourceNotFound if project doesn't exist
/// - Forbidden if the actor is not the owner
pub async fn delete(store: &dyn Store, id: Uuid, actor: &Actor, now: DateTime<Utc>) -> ApiResult<()> {
  let project = load_project(store, id, now).await?;
  lifecycle::ensure_owner(&project, actor, "delete this project")?;

  if !store.delete_project(id).await? {
    return Err(ApiError::ResourceNotFound(id.to_string()));
  }

  info!("Project {} deleted by {}", id, actor.id);

  Ok(())
}

pub async fn cancel(store: &dyn Store, id: Uuid, actor: &Actor, now: DateTime<Utc>) -> ApiResult<Project> {
  let mut project = load_project(store, id, now).await?;

  lifecycle::cancel_project(&mut project, actor, now)?;
  commit(store, &mut project).await?;

  info!("Project {} cancelled by {}", id, actor.id);

  Ok(project)
}

pub async fn review(
  store: &dyn Store,
  id: Uuid,
  actor: &Actor,
  params: NewReview,
  now: DateTime<Utc>,
) -> ApiResult<Project> {
  let mut project = load_project(store, id, now).await?;

  lifecycle::leave_review(&mut project, actor, params, now)?;
  commit(store, &mut project).await?;

  Ok(project)
}
