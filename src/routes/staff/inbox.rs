use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use diesel::{ExpressionMethods, JoinOnDsl, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    aliases::DieselError,
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, Actor, Tenant},
    models::{NotificationEntity, NotificationReceiverEntity},
    schema::{notification_receivers, notifications},
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/staff/inbox",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_inbox))
            .routes(utoipa_axum::routes!(mark_read))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::staff_authorization,
            )),
    )
}

#[derive(Serialize, ToSchema)]
struct InboxItemRes {
    notification: NotificationEntity,
    is_read: bool,
}

/// The actor's notifications in the tenant organization, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Notifications"],
    responses(
        (status = 200, description = "Get inbox successfully", body = StdResponse<Vec<InboxItemRes>, String>)
    )
)]
async fn get_inbox(
    State(state): State<AppState>,
    Extension(Tenant(organization)): Extension<Tenant>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let rows: Vec<(NotificationReceiverEntity, NotificationEntity)> = notification_receivers::table
        .inner_join(
            notifications::table.on(notifications::id.eq(notification_receivers::notification_id)),
        )
        .filter(notification_receivers::user_id.eq(actor.user_id))
        .filter(notifications::organization_id.eq(organization.id))
        .order_by(notifications::created_at.desc())
        .select((
            NotificationReceiverEntity::as_select(),
            NotificationEntity::as_select(),
        ))
        .get_results(conn)
        .await
        .context("Failed to get the inbox")?;

    let items: Vec<InboxItemRes> = rows
        .into_iter()
        .map(|(receiver, notification)| InboxItemRes {
            notification,
            is_read: receiver.is_read,
        })
        .collect();

    Ok(StdResponse {
        data: Some(items),
        message: Some("Get inbox successfully"),
    })
}

/// Mark one of the actor's notifications as read.
#[utoipa::path(
    patch,
    path = "/{notification_id}/read",
    tags = ["Notifications"],
    params(
        ("notification_id" = i32, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked read", body = StdResponse<NotificationReceiverEntity, String>),
        (status = 404, description = "The actor never received this notification")
    )
)]
async fn mark_read(
    Path(notification_id): Path<i32>,
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let receiver: QueryResult<NotificationReceiverEntity> = diesel::update(
        notification_receivers::table
            .filter(notification_receivers::notification_id.eq(notification_id))
            .filter(notification_receivers::user_id.eq(actor.user_id)),
    )
    .set(notification_receivers::is_read.eq(true))
    .returning(NotificationReceiverEntity::as_returning())
    .get_result(conn)
    .await;

    match receiver {
        Ok(receiver) => Ok(StdResponse {
            data: Some(receiver),
            message: Some("Notification marked read successfully"),
        }),
        Err(DieselError::NotFound) => Err(AppError::NotFound),
        Err(err) => Err(AppError::Other(err.into())),
    }
}
