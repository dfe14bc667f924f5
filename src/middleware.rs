use anyhow::Context;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use bigdecimal::BigDecimal;
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::RunQueryDsl;

use crate::{
    aliases::DieselError,
    app_error::AppError,
    app_state::AppState,
    choices::OrganizationRole,
    models::{OrganizationEntity, OrganizationUserEntity},
    schema::{organization_users, organizations},
};

/// Tenant-identifying header. The resolved organization is implicit
/// context for every handler; it never appears in the URL.
pub const ORGANIZATION_HEADER: &str = "x-organization-subdomain";
/// Gateway-authenticated user id. Token issuing and verification live
/// upstream; this service only needs the current actor.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct Tenant(pub OrganizationEntity);

/// The acting user and their role inside the tenant organization.
#[derive(Clone)]
pub struct Actor {
    pub user_id: i32,
    pub organization_user_id: i32,
    pub role: OrganizationRole,
    pub discount_offset: BigDecimal,
}

async fn resolve_context(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<(OrganizationEntity, Actor), AppError> {
    let subdomain = headers
        .get(ORGANIZATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::BadRequest(format!("Missing {ORGANIZATION_HEADER} header")))?;

    let user_id: i32 = headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| AppError::ForbiddenResource("Authentication required".into()))?;

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let organization: QueryResult<OrganizationEntity> = organizations::table
        .filter(organizations::subdomain.eq(subdomain))
        .select(OrganizationEntity::as_select())
        .get_result(conn)
        .await;

    let organization = match organization {
        Ok(organization) => organization,
        Err(DieselError::NotFound) => return Err(AppError::NotFound),
        Err(err) => return Err(AppError::Other(err.into())),
    };

    let membership: QueryResult<OrganizationUserEntity> = organization_users::table
        .filter(organization_users::organization_id.eq(organization.id))
        .filter(organization_users::user_id.eq(user_id))
        .select(OrganizationUserEntity::as_select())
        .get_result(conn)
        .await;

    let membership = match membership {
        Ok(membership) => membership,
        Err(DieselError::NotFound) => {
            return Err(AppError::ForbiddenResource(format!(
                "You are not a member of {}",
                organization.name
            )));
        }
        Err(err) => return Err(AppError::Other(err.into())),
    };

    let actor = Actor {
        user_id,
        organization_user_id: membership.id,
        role: OrganizationRole::parse(&membership.role)?,
        discount_offset: membership.discount_offset,
    };

    Ok((organization, actor))
}

/// Guards the customer-facing surface: any member of the tenant
/// organization may shop, whatever their role. The actor's own discount
/// offset applies to their cart and orders.
pub async fn customers_authorization(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (organization, actor) = resolve_context(&state, req.headers()).await?;

    req.extensions_mut().insert(Tenant(organization));
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// Guards the staff surface: owner, admin or staff of the tenant
/// organization. Finer role checks (backward transitions, payable edits)
/// happen in the handlers.
pub async fn staff_authorization(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (organization, actor) = resolve_context(&state, req.headers()).await?;
    if !actor.role.is_staff() {
        return Err(AppError::ForbiddenResource(
            "Organization staff access required".into(),
        ));
    }

    req.extensions_mut().insert(Tenant(organization));
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}
