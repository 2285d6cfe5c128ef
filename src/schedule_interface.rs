// Schedule HTTP Interface - thin JSON handlers over ScheduleService

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;

use crate::{
    core::{parse_timestamp, ActorId, BoardColumnId, ScheduleId, WorkspaceId},
    error::{AppError, AppResult},
    infrastructure::middleware::request_context_middleware,
    models::{
        DueCriteria, DueWindow, Schedule, ScheduleFields, ScheduleFilter, ScheduleLog,
        ScheduleParticipant, SchedulePatch,
    },
    services::ScheduleService,
};

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub board_column_id: i64,
    pub workspace_id: i64,
    pub actor_id: i64,
    #[serde(flatten)]
    pub fields: ScheduleFields,
}

#[derive(Debug, Deserialize)]
pub struct MoveScheduleRequest {
    /// Omitted or equal to the current column means a reorder within it
    pub board_column_id: Option<i64>,
    pub position: i64,
}

/// Query string for `GET /schedules`. `workspace_id` takes a comma-separated list.
#[derive(Debug, Default, Deserialize)]
pub struct ScheduleQuery {
    pub workspace_id: Option<String>,
    pub board_column_id: Option<i64>,
    pub start_after: Option<String>,
    pub end_before: Option<String>,
    pub created_by: Option<i64>,
    pub status: Option<String>,
    pub is_deleted: Option<String>,
}

impl ScheduleQuery {
    pub fn into_filter(self) -> AppResult<ScheduleFilter> {
        let workspace_ids = match self.workspace_id.as_deref() {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| {
                    part.parse::<i64>().map(WorkspaceId).map_err(|_| {
                        AppError::InvalidArgument(format!("invalid workspace id: {}", part))
                    })
                })
                .collect::<AppResult<Vec<_>>>()?,
            None => Vec::new(),
        };
        let is_deleted = self
            .is_deleted
            .as_deref()
            .map(|raw| parse_flag("is_deleted", raw))
            .transpose()?;

        Ok(ScheduleFilter {
            workspace_ids,
            board_column_id: self.board_column_id.map(BoardColumnId),
            start_after: self
                .start_after
                .as_deref()
                .map(|raw| parse_timestamp("start_after", raw))
                .transpose()?,
            end_before: self
                .end_before
                .as_deref()
                .map(|raw| parse_timestamp("end_before", raw))
                .transpose()?,
            created_by: self.created_by.map(ActorId),
            status: self.status,
            is_deleted,
            ..ScheduleFilter::default()
        })
    }
}

/// Due-date query of the workspace/column view. Parameter names follow the board client.
#[derive(Debug, Default, Deserialize)]
pub struct DueQuery {
    pub due: Option<String>,
    #[serde(rename = "dueComplete")]
    pub due_complete: Option<String>,
    pub overdue: Option<String>,
    #[serde(rename = "notDue")]
    pub not_due: Option<String>,
}

impl DueQuery {
    pub fn into_criteria(self) -> AppResult<DueCriteria> {
        let flag = |name: &str, raw: Option<String>| -> AppResult<bool> {
            Ok(raw.map(|raw| parse_flag(name, &raw)).transpose()?.unwrap_or(false))
        };
        Ok(DueCriteria {
            window: self.due.as_deref().map(DueWindow::parse).transpose()?,
            complete: flag("dueComplete", self.due_complete)?,
            overdue: flag("overdue", self.overdue)?,
            not_due: flag("notDue", self.not_due)?,
        })
    }
}

fn parse_flag(name: &str, raw: &str) -> AppResult<bool> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(AppError::InvalidArgument(format!(
            "{} must be true or false, got {}",
            name, other
        ))),
    }
}

// HTTP Handlers

pub async fn health_handler(State(service): State<ScheduleService>) -> AppResult<Json<Value>> {
    service.health_check().await?;
    Ok(Json(json!({"status": "ok"})))
}

pub async fn create_schedule_handler(
    State(service): State<ScheduleService>,
    Json(req): Json<CreateScheduleRequest>,
) -> AppResult<(StatusCode, Json<Schedule>)> {
    let schedule = service
        .create(
            BoardColumnId(req.board_column_id),
            WorkspaceId(req.workspace_id),
            ActorId(req.actor_id),
            req.fields,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

pub async fn list_schedules_handler(
    State(service): State<ScheduleService>,
    Query(query): Query<ScheduleQuery>,
) -> AppResult<Json<Vec<Schedule>>> {
    let filter = query.into_filter()?;
    Ok(Json(service.filter(&filter).await?))
}

pub async fn get_schedule_handler(
    State(service): State<ScheduleService>,
    AxumPath(id): AxumPath<i64>,
) -> AppResult<Json<Schedule>> {
    Ok(Json(service.get(ScheduleId(id)).await?))
}

pub async fn update_schedule_handler(
    State(service): State<ScheduleService>,
    AxumPath((id, actor_id)): AxumPath<(i64, i64)>,
    Json(patch): Json<SchedulePatch>,
) -> AppResult<Json<Schedule>> {
    Ok(Json(
        service
            .update(ScheduleId(id), ActorId(actor_id), patch)
            .await?,
    ))
}

pub async fn delete_schedule_handler(
    State(service): State<ScheduleService>,
    AxumPath((id, actor_id)): AxumPath<(i64, i64)>,
) -> AppResult<Json<Schedule>> {
    Ok(Json(service.delete(ScheduleId(id), ActorId(actor_id)).await?))
}

pub async fn move_schedule_handler(
    State(service): State<ScheduleService>,
    AxumPath((id, actor_id)): AxumPath<(i64, i64)>,
    Json(req): Json<MoveScheduleRequest>,
) -> AppResult<Json<Schedule>> {
    Ok(Json(
        service
            .move_schedule(
                ScheduleId(id),
                ActorId(actor_id),
                req.board_column_id.map(BoardColumnId),
                req.position,
            )
            .await?,
    ))
}

pub async fn update_transcript_handler(
    State(service): State<ScheduleService>,
    AxumPath((id, actor_id)): AxumPath<(i64, i64)>,
    Json(transcript): Json<Value>,
) -> AppResult<Json<Schedule>> {
    Ok(Json(
        service
            .update_transcript(ScheduleId(id), ActorId(actor_id), &transcript)
            .await?,
    ))
}

pub async fn list_logs_handler(
    State(service): State<ScheduleService>,
    AxumPath(id): AxumPath<i64>,
) -> AppResult<Json<Vec<ScheduleLog>>> {
    Ok(Json(service.list_logs(ScheduleId(id)).await?))
}

pub async fn list_participants_handler(
    State(service): State<ScheduleService>,
    AxumPath(id): AxumPath<i64>,
) -> AppResult<Json<Vec<ScheduleParticipant>>> {
    Ok(Json(service.list_participants(ScheduleId(id)).await?))
}

pub async fn list_column_handler(
    State(service): State<ScheduleService>,
    AxumPath(column_id): AxumPath<i64>,
) -> AppResult<Json<Vec<Schedule>>> {
    Ok(Json(service.list_by_column(BoardColumnId(column_id)).await?))
}

pub async fn list_workspace_handler(
    State(service): State<ScheduleService>,
    AxumPath(workspace_id): AxumPath<i64>,
) -> AppResult<Json<Vec<Schedule>>> {
    Ok(Json(
        service
            .list_by_workspace(WorkspaceId(workspace_id))
            .await?,
    ))
}

pub async fn list_workspace_column_handler(
    State(service): State<ScheduleService>,
    AxumPath((workspace_id, column_id)): AxumPath<(i64, i64)>,
    Query(query): Query<DueQuery>,
) -> AppResult<Json<Vec<Schedule>>> {
    let due = query.into_criteria()?;
    Ok(Json(
        service
            .filter_workspace_column(WorkspaceId(workspace_id), BoardColumnId(column_id), due)
            .await?,
    ))
}

// Schedule router
pub fn create_schedule_router(service: ScheduleService) -> Router {
    Router::new()
        .route("/health", get(health_handler))

        // Schedules
        .route("/schedules", get(list_schedules_handler).post(create_schedule_handler))
        .route("/schedules/{id}", get(get_schedule_handler))
        .route(
            "/schedules/{id}/actors/{actor_id}",
            put(update_schedule_handler).delete(delete_schedule_handler),
        )
        .route("/schedules/{id}/actors/{actor_id}/position", put(move_schedule_handler))
        .route("/schedules/{id}/actors/{actor_id}/transcript", put(update_transcript_handler))
        .route("/schedules/{id}/logs", get(list_logs_handler))
        .route("/schedules/{id}/participants", get(list_participants_handler))

        // Board views
        .route("/board-columns/{column_id}/schedules", get(list_column_handler))
        .route("/workspaces/{workspace_id}/schedules", get(list_workspace_handler))
        .route(
            "/workspaces/{workspace_id}/board-columns/{column_id}/schedules",
            get(list_workspace_column_handler),
        )

        .layer(ServiceBuilder::new().layer(middleware::from_fn(request_context_middleware)))
        .with_state(service)
}
