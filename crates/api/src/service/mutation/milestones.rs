use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::{
  entities::{milestone::MilestoneStatus, project::Project},
  error::ApiResult,
  service::{
    commit,
    lifecycle::{self, Actor, NewMilestone},
    load_project,
  },
  store::Store,
};

pub async fn add(
  store: &dyn Store,
  project_id: Uuid,
  actor: &Actor,
  params: NewMilestone,
  now: DateTime<Utc>,
) -> ApiResult<Project> {
  let mut project = load_project(store, project_id, now).await?;

  let milestone_id = lifecycle::add_milestone(&mut project, actor, params, now)?;
  commit(store, &mut project).await?;

  info!("Milestone {} added to project {}", milestone_id, project_id);

  Ok(project)
}

/// Moves a milestone to `status`, completing the project once every
/// milestone is approved
///
/// # Errors
/// - ResourceNotFound if the project or the milestone doesn't exist
/// - Forbidden if the actor may not request `status`
/// - InvalidState if the project is not in progress or the transition is not allowed
/// - ConcurrentModification if the project changed since it was loaded
pub async fn update_status(
  store: &dyn Store,
  project_id: Uuid,
  milestone_id: Uuid,
  actor: &Actor,
  status: MilestoneStatus,
  now: DateTime<Utc>,
) -> ApiResult<Project> {
  let mut project = load_project(store, project_id, now).await?;

  lifecycle::update_milestone(&mut project, actor, milestone_id, status, now)?;
  commit(store, &mut project).await?;

  info!(
    "Milestone {} of project {} is now {}, project is {}",
    milestone_id, project_id, status, project.status
  );

  Ok(project)
}
