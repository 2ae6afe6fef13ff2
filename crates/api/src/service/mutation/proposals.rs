use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use crate::{
  entities::project::Project,
  error::ApiResult,
  service::{
    commit,
    lifecycle::{self, Actor, NewProposal, ProposalDecision},
    load_project,
  },
  store::Store,
};

/// Submits the actor's proposal to an open project
///
/// # Errors
/// - ResourceNotFound if project doesn't exist
/// - Forbidden if the actor is not a freelancer or owns the project
/// - InvalidState if the project is not open (including after the deadline sweep)
/// - AlreadyApplied if the actor already has a proposal on the project
/// - ConcurrentModification if the project changed since it was loaded
pub async fn submit(
  store: &dyn Store,
  project_id: Uuid,
  actor: &Actor,
  params: NewProposal,
  now: DateTime<Utc>,
) -> ApiResult<Project> {
  let mut project = load_project(store, project_id, now).await?;

  let proposal_id = lifecycle::submit_proposal(&mut project, actor, params, now)?;
  commit(store, &mut project).await?;

  info!("Proposal {} submitted to project {} by {}", proposal_id, project_id, actor.id);

  Ok(project)
}

/// Accepts or rejects a pending proposal. Accepting assigns the freelancer,
/// starts the project and rejects every other pending proposal.
pub async fn decide(
  store: &dyn Store,
  project_id: Uuid,
  proposal_id: Uuid,
  actor: &Actor,
  decision: ProposalDecision,
  now: DateTime<Utc>,
) -> ApiResult<Project> {
  let mut project = load_project(store, project_id, now).await?;

  lifecycle::decide_proposal(&mut project, actor, proposal_id, decision, now)?;
  commit(store, &mut project).await?;

  info!("Proposal {} on project {} {:?}", proposal_id, project_id, decision);

  Ok(project)
}
