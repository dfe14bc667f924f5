use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, Tenant},
    models::TransactionEntity,
    schema::transactions,
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/staff/customers",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_customer_transactions))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::staff_authorization,
            )),
    )
}

#[derive(Serialize, ToSchema)]
struct TransactionWithDueRes {
    transaction: TransactionEntity,
    /// Balance before this transaction; negative means the customer owed.
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    previous_due: BigDecimal,
    /// Balance after this transaction.
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    current_due: BigDecimal,
}

/// Folds the running balance over chronologically ordered ledger rows.
fn with_running_due(rows: Vec<TransactionEntity>) -> Vec<TransactionWithDueRes> {
    let mut due = BigDecimal::from(0);
    rows.into_iter()
        .map(|transaction| {
            let previous_due = due.clone();
            due = &previous_due + &transaction.payable_money - &transaction.total_money;
            TransactionWithDueRes {
                transaction,
                previous_due,
                current_due: due.clone(),
            }
        })
        .collect()
}

/// A customer's ledger in the tenant organization, oldest first, with the
/// running due carried across the rows.
#[utoipa::path(
    get,
    path = "/{user_id}/transactions",
    tags = ["Transactions"],
    params(
        ("user_id" = i32, Path, description = "Customer user ID")
    ),
    responses(
        (status = 200, description = "Get transactions successfully", body = StdResponse<Vec<TransactionWithDueRes>, String>)
    )
)]
async fn get_customer_transactions(
    Path(user_id): Path<i32>,
    State(state): State<AppState>,
    Extension(Tenant(organization)): Extension<Tenant>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let rows: Vec<TransactionEntity> = transactions::table
        .filter(transactions::organization_id.eq(organization.id))
        .filter(transactions::customer_id.eq(user_id))
        .order_by(transactions::created_at.asc())
        .select(TransactionEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get transactions")?;

    Ok(StdResponse {
        data: Some(with_running_due(rows)),
        message: Some("Get transactions successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn transaction(total: &str, payable: &str) -> TransactionEntity {
        TransactionEntity {
            id: 1,
            organization_id: 1,
            customer_id: 1,
            order_id: None,
            total_money: BigDecimal::from_str(total).unwrap(),
            payable_money: BigDecimal::from_str(payable).unwrap(),
            serial_number: 123_456,
            note: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn due_accumulates_left_to_right() {
        // Customer pays 80 of 100, then 120 of 100.
        let rows = vec![transaction("100.00", "80.00"), transaction("100.00", "120.00")];
        let with_due = with_running_due(rows);

        assert_eq!(with_due[0].previous_due, BigDecimal::from(0));
        assert_eq!(with_due[0].current_due, BigDecimal::from_str("-20.00").unwrap());
        assert_eq!(with_due[1].previous_due, BigDecimal::from_str("-20.00").unwrap());
        assert_eq!(with_due[1].current_due, BigDecimal::from(0));
    }

    #[test]
    fn empty_ledger_yields_no_rows() {
        assert!(with_running_due(Vec::new()).is_empty());
    }
}
