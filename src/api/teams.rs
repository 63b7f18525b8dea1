//! Team API endpoints.

use axum::extract::State;

use super::{ApiResponse, ApiResult};
use crate::models::Team;
use crate::AppState;

/// GET /api/teams - List all teams.
pub async fn list_teams(State(state): State<AppState>) -> ApiResult<Vec<Team>> {
    let teams = state.ctx.repo.list_teams().await?;
    Ok(ApiResponse::new(teams))
}
