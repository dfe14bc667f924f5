use std::collections::HashMap;
use std::str::FromStr;

use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use diesel::{ExpressionMethods, JoinOnDsl, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    aliases::DieselError,
    app_error::{AppError, StdResponse},
    app_state::AppState,
    choices::{ActionType, OrderDeliveryStatus, OrderStage, OrganizationRole},
    middleware::{self, Actor, Tenant},
    models::{
        CreateOrderEntity, CreateOrderProductEntity, CreateOrganizationUserEntity,
        CreateReturnOrderProductEntity, CreateUserEntity, OrderDeliveryEntity, OrderEntity,
        OrderProductEntity, OrganizationUserEntity, PaymentMethodEntity, ProductEntity,
        UserEntity,
    },
    notifications::{self, Notifiable, NotificationService},
    pricing,
    routes::shared::{self, OrderDetailRes},
    schema::{
        order_deliveries, order_products, orders, organization_users, payment_methods, products,
        return_order_products, transactions, users,
    },
    serial,
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/staff/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_orders, create_order))
            .routes(utoipa_axum::routes!(get_order, update_order))
            .routes(utoipa_axum::routes!(return_products))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::staff_authorization,
            )),
    )
}

fn parse_money(field: &str, value: &str) -> Result<BigDecimal, AppError> {
    BigDecimal::from_str(value)
        .map_err(|_| AppError::field_validation(field, format!("{value} is not a valid amount")))
}

/// A requested status move relative to the canonical order. Repeating the
/// current status is a no-op: nothing is restaged and nothing is
/// announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionKind {
    Unchanged,
    Forward,
    Backward,
}

fn classify_transition(
    current: OrderDeliveryStatus,
    target: OrderDeliveryStatus,
) -> TransitionKind {
    if target == current {
        TransitionKind::Unchanged
    } else if target.index() < current.index() {
        TransitionKind::Backward
    } else {
        TransitionKind::Forward
    }
}

/// Moves the target row to CURRENT and restages every other row of the
/// order relative to it. Returns the new CURRENT row; a missing target row
/// (merchant-recorded orders skip the return statuses) is a client error.
async fn restage_delivery_rows(
    conn: &mut AsyncPgConnection,
    order_id: i32,
    target: OrderDeliveryStatus,
) -> Result<OrderDeliveryEntity, AppError> {
    let mut completed: Vec<&'static str> = Vec::new();
    let mut pending: Vec<&'static str> = Vec::new();
    for status in OrderDeliveryStatus::ALL {
        match status.stage_after_transition(target) {
            OrderStage::Current => {}
            OrderStage::Completed => completed.push(status.as_str()),
            OrderStage::Pending => pending.push(status.as_str()),
        }
    }

    diesel::update(
        order_deliveries::table
            .filter(order_deliveries::order_id.eq(order_id))
            .filter(order_deliveries::status.eq_any(&completed)),
    )
    .set(order_deliveries::stage.eq(OrderStage::Completed.as_str()))
    .execute(conn)
    .await
    .context("Failed to restage completed delivery rows")?;

    diesel::update(
        order_deliveries::table
            .filter(order_deliveries::order_id.eq(order_id))
            .filter(order_deliveries::status.eq_any(&pending)),
    )
    .set(order_deliveries::stage.eq(OrderStage::Pending.as_str()))
    .execute(conn)
    .await
    .context("Failed to restage pending delivery rows")?;

    let current_row: QueryResult<OrderDeliveryEntity> = diesel::update(
        order_deliveries::table
            .filter(order_deliveries::order_id.eq(order_id))
            .filter(order_deliveries::status.eq(target.as_str())),
    )
    .set(order_deliveries::stage.eq(OrderStage::Current.as_str()))
    .returning(OrderDeliveryEntity::as_returning())
    .get_result(conn)
    .await;

    match current_row {
        Ok(row) => {
            // Re-check after the writes; two CURRENT rows means the data
            // was already broken and the transaction must not commit.
            shared::current_delivery_status(conn, order_id).await?;
            Ok(row)
        }
        Err(DieselError::NotFound) => Err(AppError::BadRequest(format!(
            "This order cannot be moved to {}",
            target.as_str()
        ))),
        Err(err) => Err(AppError::Other(err.into())),
    }
}

#[derive(Deserialize, ToSchema)]
struct GetOrdersQuery {
    /// Restrict to orders whose current delivery status matches.
    status: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct StaffOrderListItem {
    order: OrderEntity,
    customer: UserEntity,
    current_status: String,
}

/// All orders of the tenant organization, newest first, optionally
/// filtered by their current delivery status.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    params(
        ("status" = Option<String>, Query, description = "Current delivery status filter")
    ),
    responses(
        (status = 200, description = "Get orders successfully", body = StdResponse<Vec<StaffOrderListItem>, String>)
    )
)]
async fn get_orders(
    State(state): State<AppState>,
    Extension(Tenant(organization)): Extension<Tenant>,
    Query(query): Query<GetOrdersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let mut list_query = orders::table
        .inner_join(order_deliveries::table.on(order_deliveries::order_id.eq(orders::id)))
        .inner_join(users::table.on(users::id.eq(orders::customer_id)))
        .filter(orders::organization_id.eq(organization.id))
        .filter(order_deliveries::stage.eq(OrderStage::Current.as_str()))
        .order_by(orders::created_at.desc())
        .select((
            OrderEntity::as_select(),
            OrderDeliveryEntity::as_select(),
            UserEntity::as_select(),
        ))
        .into_boxed();

    if let Some(status) = &query.status {
        let status = OrderDeliveryStatus::parse(status)?;
        list_query = list_query.filter(order_deliveries::status.eq(status.as_str()));
    }

    let rows: Vec<(OrderEntity, OrderDeliveryEntity, UserEntity)> = list_query
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    let items: Vec<StaffOrderListItem> = rows
        .into_iter()
        .map(|(order, current, customer)| StaffOrderListItem {
            order,
            customer,
            current_status: current.status,
        })
        .collect();

    Ok(StdResponse {
        data: Some(items),
        message: Some("Get orders successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct MerchantOrderLineReq {
    product_id: i32,
    #[schema(minimum = 1)]
    quantity: i32,
}

#[derive(Deserialize, ToSchema)]
struct CreateMerchantOrderReq {
    /// The customer is looked up (or created) by phone number.
    customer_phone: String,
    #[serde(default)]
    customer_first_name: String,
    #[serde(default)]
    customer_last_name: String,
    payment_method_id: i32,
    products: Vec<MerchantOrderLineReq>,
    /// What the customer actually paid; defaults to the order total.
    payable_amount: Option<String>,
    #[serde(default)]
    note: String,
}

async fn get_or_create_customer(
    conn: &mut AsyncPgConnection,
    organization_id: i32,
    body: &CreateMerchantOrderReq,
) -> Result<(UserEntity, OrganizationUserEntity), AppError> {
    let user: QueryResult<UserEntity> = users::table
        .filter(users::phone.eq(&body.customer_phone))
        .select(UserEntity::as_select())
        .get_result(conn)
        .await;
    let user = match user {
        Ok(user) => user,
        Err(DieselError::NotFound) => diesel::insert_into(users::table)
            .values(CreateUserEntity {
                phone: body.customer_phone.clone(),
                first_name: body.customer_first_name.clone(),
                last_name: body.customer_last_name.clone(),
            })
            .returning(UserEntity::as_returning())
            .get_result(conn)
            .await
            .context("Failed to create user")?,
        Err(err) => return Err(AppError::Other(err.into())),
    };

    let membership: QueryResult<OrganizationUserEntity> = organization_users::table
        .filter(organization_users::organization_id.eq(organization_id))
        .filter(organization_users::user_id.eq(user.id))
        .select(OrganizationUserEntity::as_select())
        .get_result(conn)
        .await;
    let membership = match membership {
        Ok(membership) => membership,
        Err(DieselError::NotFound) => diesel::insert_into(organization_users::table)
            .values(CreateOrganizationUserEntity {
                organization_id,
                user_id: user.id,
                role: OrganizationRole::Customer.as_str().to_string(),
                discount_offset: BigDecimal::from(0),
            })
            .returning(OrganizationUserEntity::as_returning())
            .get_result(conn)
            .await
            .context("Failed to create organization membership")?,
        Err(err) => return Err(AppError::Other(err.into())),
    };

    Ok((user, membership))
}

/// Records a sale that already happened over the counter.
///
/// The order is created completed: the delivery history is marked as
/// passed with COMPLETED current (the return and cancel statuses are
/// skipped entirely), the ledger row is written immediately and both the
/// order and the transaction are announced. Only admins and owners may
/// record these.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    request_body = CreateMerchantOrderReq,
    responses(
        (status = 201, description = "Order recorded", body = StdResponse<OrderDetailRes, String>),
        (status = 400, description = "Invalid products or stocked-out products"),
        (status = 403, description = "Caller is not an admin or owner")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(Tenant(organization)): Extension<Tenant>,
    Extension(actor): Extension<Actor>,
    axum::Json(body): axum::Json<CreateMerchantOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    if !actor.role.is_admin_or_owner() {
        return Err(AppError::ForbiddenResource(
            "Only admins and owners may record orders".into(),
        ));
    }
    if body.products.is_empty() {
        return Err(AppError::field_validation(
            "products",
            "At least one product is required",
        ));
    }
    if body.products.iter().any(|line| line.quantity < 1) {
        return Err(AppError::field_validation(
            "quantity",
            "Quantity must be at least 1",
        ));
    }

    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let detail = conn
        .transaction::<OrderDetailRes, AppError, _>(move |conn| {
            Box::pin(async move {
                let payment_method: QueryResult<PaymentMethodEntity> = payment_methods::table
                    .find(body.payment_method_id)
                    .select(PaymentMethodEntity::as_select())
                    .get_result(conn)
                    .await;
                let payment_method = match payment_method {
                    Ok(payment_method) => payment_method,
                    Err(DieselError::NotFound) => {
                        return Err(AppError::field_validation(
                            "payment_method_id",
                            "Unknown payment method",
                        ));
                    }
                    Err(err) => return Err(AppError::Other(err.into())),
                };

                let (customer, membership) =
                    get_or_create_customer(conn, organization.id, &body).await?;

                let product_ids: Vec<i32> =
                    body.products.iter().map(|line| line.product_id).collect();
                let catalog: HashMap<i32, ProductEntity> = products::table
                    .filter(products::id.eq_any(&product_ids))
                    .filter(products::organization_id.eq(organization.id))
                    .select(ProductEntity::as_select())
                    .get_results::<ProductEntity>(conn)
                    .await
                    .context("Failed to get products")?
                    .into_iter()
                    .map(|product| (product.id, product))
                    .collect();

                let mut stocked_out: Vec<String> = Vec::new();
                let mut undiscounted_totals = Vec::with_capacity(body.products.len());
                let mut discounted_totals = Vec::with_capacity(body.products.len());
                let mut line_snapshots = Vec::with_capacity(body.products.len());
                for line in &body.products {
                    let Some(product) = catalog.get(&line.product_id) else {
                        return Err(AppError::field_validation(
                            "products",
                            format!(
                                "Product {} is not {} organization's product",
                                line.product_id, organization.name
                            ),
                        ));
                    };
                    if !shared::decrement_stock(conn, product.id, line.quantity).await? {
                        stocked_out.push(product.name.clone());
                        continue;
                    }
                    let discount = pricing::effective_discount(
                        &product.discount_price,
                        &membership.discount_offset,
                    );
                    let unit =
                        pricing::unit_price_after_discount(&product.selling_price, &discount);
                    undiscounted_totals
                        .push(pricing::line_total(&product.selling_price, line.quantity));
                    discounted_totals.push(pricing::line_total(&unit, line.quantity));
                    line_snapshots.push((product.id, product.selling_price.clone(), discount));
                }
                if !stocked_out.is_empty() {
                    return Err(AppError::BadRequest(format!(
                        "These products are stocked out: {}",
                        stocked_out.join(", ")
                    )));
                }

                // Over-the-counter sales carry no delivery charge.
                let delivery_charge = BigDecimal::from(0);
                let order_price =
                    pricing::order_total(undiscounted_totals.iter(), &BigDecimal::from(0));
                let total_price =
                    pricing::order_total(discounted_totals.iter(), &delivery_charge);
                let payable_amount = match &body.payable_amount {
                    Some(value) => parse_money("payable_amount", value)?,
                    None => total_price.clone(),
                };

                let order = shared::insert_order_with_serial(
                    conn,
                    CreateOrderEntity {
                        serial_number: serial::generate(),
                        customer_id: customer.id,
                        ordered_by_id: actor.user_id,
                        organization_id: organization.id,
                        order_price,
                        total_price,
                        payable_amount,
                        discount_offset: membership.discount_offset.clone(),
                        address: serde_json::json!({}),
                        completed: true,
                        note: body.note.clone(),
                        delivery_charge,
                        receiver_name: String::new(),
                        receiver_phone: String::new(),
                        payment_method_id: payment_method.id,
                    },
                )
                .await?;

                let order_lines: Vec<CreateOrderProductEntity> = body
                    .products
                    .iter()
                    .zip(line_snapshots)
                    .map(
                        |(line, (product_id, selling_price, discount_price))| {
                            CreateOrderProductEntity {
                                order_id: order.id,
                                product_id,
                                selling_price,
                                discount_price,
                                quantity: line.quantity,
                                updated_quantity: line.quantity,
                                delivery_quantity: line.quantity,
                            }
                        },
                    )
                    .collect();
                diesel::insert_into(order_products::table)
                    .values(order_lines)
                    .execute(conn)
                    .await
                    .context("Failed to create order products")?;

                shared::create_delivery_rows(conn, order.id, true).await?;

                let transaction = shared::insert_transaction_for_order(conn, &order).await?;

                let notifier = NotificationService::new(organization.id, actor.user_id);
                let order_notification = notifier
                    .notify_organization_users(
                        conn,
                        Notifiable::Order(order.id),
                        ActionType::Addition,
                        serde_json::json!({}),
                        &format!("Order #{} has been recorded", order.serial_number),
                    )
                    .await?;
                notifier
                    .send_to_users(conn, order_notification.id, &[customer.id])
                    .await?;
                let transaction_notification = notifier
                    .notify_organization_users(
                        conn,
                        Notifiable::Transaction(transaction.id),
                        ActionType::Addition,
                        serde_json::json!({}),
                        &format!(
                            "Transaction #{} has been recorded for order #{}",
                            transaction.serial_number, order.serial_number
                        ),
                    )
                    .await?;
                notifier
                    .send_to_users(conn, transaction_notification.id, &[customer.id])
                    .await?;

                shared::load_order_detail(conn, order).await
            })
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(detail),
            message: Some("Order recorded successfully"),
        },
    ))
}

/// Full detail of one order of the tenant organization.
#[utoipa::path(
    get,
    path = "/{order_id}",
    tags = ["Orders"],
    params(
        ("order_id" = i32, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Get order successfully", body = StdResponse<OrderDetailRes, String>),
        (status = 404, description = "No such order in this organization")
    )
)]
async fn get_order(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    Extension(Tenant(organization)): Extension<Tenant>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let order: QueryResult<OrderEntity> = orders::table
        .find(order_id)
        .filter(orders::organization_id.eq(organization.id))
        .select(OrderEntity::as_select())
        .get_result(conn)
        .await;
    let order = match order {
        Ok(order) => order,
        Err(DieselError::NotFound) => return Err(AppError::NotFound),
        Err(err) => return Err(AppError::Other(err.into())),
    };

    let detail = shared::load_order_detail(conn, order).await?;

    Ok(StdResponse {
        data: Some(detail),
        message: Some("Get order successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct UpdateOrderReq {
    /// Target delivery status, e.g. "ON_THE_WAY".
    delivery_status_name: Option<String>,
    delivery_charge: Option<String>,
    /// Only admins and owners may change what the customer owes.
    payable_amount: Option<String>,
    note: Option<String>,
}

/// Edits an order: its delivery charge, payable amount, note and, most
/// importantly, its delivery status.
///
/// The order row is locked for the whole transaction. A delivery-charge
/// change recomputes the total before any status logic runs, so a
/// transition to COMPLETED snapshots the corrected amount into the ledger.
/// Moving a completed order anywhere else deletes its ledger rows again;
/// re-completing it later writes a fresh one. Staff may only move the
/// status forward.
#[utoipa::path(
    patch,
    path = "/{order_id}",
    tags = ["Orders"],
    params(
        ("order_id" = i32, Path, description = "Order ID")
    ),
    request_body = UpdateOrderReq,
    responses(
        (status = 200, description = "Order updated", body = StdResponse<OrderDetailRes, String>),
        (status = 400, description = "Unknown status or impossible transition"),
        (status = 403, description = "Backward move or payable edit without admin rights"),
        (status = 404, description = "No such order in this organization")
    )
)]
async fn update_order(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    Extension(Tenant(organization)): Extension<Tenant>,
    Extension(actor): Extension<Actor>,
    axum::Json(body): axum::Json<UpdateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let detail = conn
        .transaction::<OrderDetailRes, AppError, _>(move |conn| {
            Box::pin(async move {
                // Serializes concurrent status updates on the same order.
                let order: QueryResult<OrderEntity> = orders::table
                    .find(order_id)
                    .filter(orders::organization_id.eq(organization.id))
                    .for_update()
                    .select(OrderEntity::as_select())
                    .get_result(conn)
                    .await;
                let mut order = match order {
                    Ok(order) => order,
                    Err(DieselError::NotFound) => return Err(AppError::NotFound),
                    Err(err) => return Err(AppError::Other(err.into())),
                };

                if let Some(value) = &body.delivery_charge {
                    let charge = parse_money("delivery_charge", value)?;
                    let total = shared::recompute_total_price(conn, order.id, &charge).await?;
                    order = diesel::update(orders::table.find(order.id))
                        .set((
                            orders::delivery_charge.eq(&charge),
                            orders::total_price.eq(&total),
                        ))
                        .returning(OrderEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to update the delivery charge")?;
                }

                if let Some(value) = &body.payable_amount {
                    if !actor.role.is_admin_or_owner() {
                        return Err(AppError::ForbiddenResource(
                            "Only admins and owners may edit the payable amount".into(),
                        ));
                    }
                    let payable = parse_money("payable_amount", value)?;
                    order = diesel::update(orders::table.find(order.id))
                        .set(orders::payable_amount.eq(&payable))
                        .returning(OrderEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to update the payable amount")?;
                }

                if let Some(note) = &body.note {
                    order = diesel::update(orders::table.find(order.id))
                        .set(orders::note.eq(note))
                        .returning(OrderEntity::as_returning())
                        .get_result(conn)
                        .await
                        .context("Failed to update the note")?;
                }

                if let Some(status_name) = &body.delivery_status_name {
                    let target = OrderDeliveryStatus::parse(status_name)?;
                    let current_row = shared::current_delivery_status(conn, order.id).await?;
                    let current = OrderDeliveryStatus::parse(&current_row.status)
                        .map_err(|_| {
                            AppError::Consistency(format!(
                                "Order {} carries unknown status {}",
                                order.id, current_row.status
                            ))
                        })?;

                    let kind = classify_transition(current, target);
                    if kind == TransitionKind::Backward && !actor.role.is_admin_or_owner() {
                        return Err(AppError::ForbiddenResource(
                            "Only admins and owners may move an order backward".into(),
                        ));
                    }

                    if kind != TransitionKind::Unchanged {
                        let new_current =
                            restage_delivery_rows(conn, order.id, target).await?;

                        let notifier =
                            NotificationService::new(organization.id, actor.user_id);
                        let notification = notifier
                            .notify_organization_users(
                                conn,
                                Notifiable::OrderDelivery(new_current.id),
                                ActionType::Change,
                                notifications::changed_field(
                                    "delivery_status",
                                    current.as_str(),
                                    target.as_str(),
                                ),
                                &format!(
                                    "Order #{} moved from {} to {}",
                                    order.serial_number,
                                    current.as_str(),
                                    target.as_str()
                                ),
                            )
                            .await?;
                        notifier
                            .send_to_users(conn, notification.id, &[order.customer_id])
                            .await?;

                        if target == OrderDeliveryStatus::Completed && !order.completed {
                            order = diesel::update(orders::table.find(order.id))
                                .set(orders::completed.eq(true))
                                .returning(OrderEntity::as_returning())
                                .get_result(conn)
                                .await
                                .context("Failed to mark the order completed")?;
                            let transaction =
                                shared::insert_transaction_for_order(conn, &order).await?;
                            let transaction_notification = notifier
                                .notify_organization_users(
                                    conn,
                                    Notifiable::Transaction(transaction.id),
                                    ActionType::Addition,
                                    serde_json::json!({}),
                                    &format!(
                                        "Transaction #{} has been recorded for order #{}",
                                        transaction.serial_number, order.serial_number
                                    ),
                                )
                                .await?;
                            notifier
                                .send_to_users(
                                    conn,
                                    transaction_notification.id,
                                    &[order.customer_id],
                                )
                                .await?;
                        } else if target != OrderDeliveryStatus::Completed && order.completed {
                            order = diesel::update(orders::table.find(order.id))
                                .set(orders::completed.eq(false))
                                .returning(OrderEntity::as_returning())
                                .get_result(conn)
                                .await
                                .context("Failed to unmark the order completed")?;
                            diesel::delete(
                                transactions::table
                                    .filter(transactions::order_id.eq(order.id)),
                            )
                            .execute(conn)
                            .await
                            .context("Failed to delete the order's transactions")?;
                            let deletion_notification = notifier
                                .notify_organization_users(
                                    conn,
                                    Notifiable::Order(order.id),
                                    ActionType::Deletion,
                                    serde_json::json!({}),
                                    &format!(
                                        "Transactions for order #{} have been removed",
                                        order.serial_number
                                    ),
                                )
                                .await?;
                            notifier
                                .send_to_users(
                                    conn,
                                    deletion_notification.id,
                                    &[order.customer_id],
                                )
                                .await?;
                        }
                    }
                }

                shared::load_order_detail(conn, order).await
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(detail),
        message: Some("Order updated successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct ReturnProductReq {
    order_product_id: i32,
    returned_quantity: i32,
    /// Damaged units go to the damage stock instead of the sellable stock.
    #[serde(default)]
    is_damage: bool,
    #[serde(default)]
    note: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize, ToSchema)]
struct ReturnOrderReq {
    products: Vec<ReturnProductReq>,
}

/// Records returned quantities against an order's lines.
///
/// Only possible while the order sits at PARTIAL_RETURNED (the customer
/// sent goods back) or PARTIAL_DELIVERY (the merchant held goods back);
/// the latter flags the rows as merchant returns. Every line is validated
/// before anything is written, so an over-return leaves no partial state.
/// Returned units go back to stock, or to damage stock when flagged, and
/// the order total is recomputed from the remaining quantities.
#[utoipa::path(
    put,
    path = "/{order_id}/returns",
    tags = ["Orders"],
    params(
        ("order_id" = i32, Path, description = "Order ID")
    ),
    request_body = ReturnOrderReq,
    responses(
        (status = 200, description = "Returns recorded", body = StdResponse<OrderDetailRes, String>),
        (status = 400, description = "Order not in a returnable status or quantity exceeded"),
        (status = 404, description = "No such order in this organization")
    )
)]
async fn return_products(
    Path(order_id): Path<i32>,
    State(state): State<AppState>,
    Extension(Tenant(organization)): Extension<Tenant>,
    Extension(actor): Extension<Actor>,
    axum::Json(body): axum::Json<ReturnOrderReq>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let detail = conn
        .transaction::<OrderDetailRes, AppError, _>(move |conn| {
            Box::pin(async move {
                let order: QueryResult<OrderEntity> = orders::table
                    .find(order_id)
                    .filter(orders::organization_id.eq(organization.id))
                    .for_update()
                    .select(OrderEntity::as_select())
                    .get_result(conn)
                    .await;
                let order = match order {
                    Ok(order) => order,
                    Err(DieselError::NotFound) => return Err(AppError::NotFound),
                    Err(err) => return Err(AppError::Other(err.into())),
                };

                let current_row = shared::current_delivery_status(conn, order.id).await?;
                let current = OrderDeliveryStatus::parse(&current_row.status).map_err(|_| {
                    AppError::Consistency(format!(
                        "Order {} carries unknown status {}",
                        order.id, current_row.status
                    ))
                })?;
                let is_return_by_merchant = match current {
                    OrderDeliveryStatus::PartialDelivery => true,
                    OrderDeliveryStatus::PartialReturned => false,
                    other => {
                        return Err(AppError::BadRequest(format!(
                            "Products cannot be returned while the order is {}",
                            other.as_str()
                        )));
                    }
                };

                let lines: HashMap<i32, (OrderProductEntity, ProductEntity)> = order_products::table
                    .inner_join(products::table)
                    .filter(order_products::order_id.eq(order.id))
                    .select((OrderProductEntity::as_select(), ProductEntity::as_select()))
                    .get_results::<(OrderProductEntity, ProductEntity)>(conn)
                    .await
                    .context("Failed to get order products")?
                    .into_iter()
                    .map(|(line, product)| (line.id, (line, product)))
                    .collect();

                // Validate the whole request before touching anything.
                let mut accepted: Vec<(&ReturnProductReq, &OrderProductEntity, &ProductEntity)> =
                    Vec::new();
                for request in &body.products {
                    if request.returned_quantity == 0 {
                        continue;
                    }
                    let Some((line, product)) = lines.get(&request.order_product_id) else {
                        return Err(AppError::field_validation(
                            "order_product_id",
                            format!(
                                "Order product {} does not belong to this order",
                                request.order_product_id
                            ),
                        ));
                    };
                    if request.returned_quantity < 0
                        || request.returned_quantity > line.updated_quantity
                    {
                        return Err(AppError::field_validation(
                            "returned_quantity",
                            format!("Maximum return product {} exceed.", product.name),
                        ));
                    }
                    accepted.push((request, line, product));
                }

                for (request, line, product) in accepted {
                    diesel::insert_into(return_order_products::table)
                        .values(CreateReturnOrderProductEntity {
                            order_id: order.id,
                            order_product_id: line.id,
                            product_id: product.id,
                            organization_id: organization.id,
                            returned_quantity: request.returned_quantity,
                            is_return_by_merchant,
                            note: request.note.clone(),
                            description: request.description.clone(),
                            is_damage: request.is_damage,
                        })
                        .execute(conn)
                        .await
                        .context("Failed to create return record")?;

                    diesel::update(order_products::table.find(line.id))
                        .set(
                            order_products::updated_quantity
                                .eq(order_products::updated_quantity - request.returned_quantity),
                        )
                        .execute(conn)
                        .await
                        .context("Failed to decrement the order line quantity")?;

                    let restock = diesel::update(products::table.find(product.id));
                    if request.is_damage {
                        restock
                            .set(
                                products::damage_stock
                                    .eq(products::damage_stock + request.returned_quantity),
                            )
                            .execute(conn)
                            .await
                            .context("Failed to restock damaged units")?;
                    } else {
                        restock
                            .set(products::stock.eq(products::stock + request.returned_quantity))
                            .execute(conn)
                            .await
                            .context("Failed to restock returned units")?;
                    }
                }

                let previous_total = order.total_price.clone();
                let total =
                    shared::recompute_total_price(conn, order.id, &order.delivery_charge).await?;
                let order = diesel::update(orders::table.find(order.id))
                    .set(orders::total_price.eq(&total))
                    .returning(OrderEntity::as_returning())
                    .get_result(conn)
                    .await
                    .context("Failed to update the order total")?;

                let notifier = NotificationService::new(organization.id, actor.user_id);
                let notification = notifier
                    .notify_organization_users(
                        conn,
                        Notifiable::Order(order.id),
                        ActionType::Change,
                        notifications::changed_field(
                            "total_price",
                            pricing::round2(&previous_total).to_string(),
                            pricing::round2(&total).to_string(),
                        ),
                        &format!("Returns recorded for order #{}", order.serial_number),
                    )
                    .await?;
                notifier
                    .send_to_users(conn, notification.id, &[order.customer_id])
                    .await?;

                shared::load_order_detail(conn, order).await
            })
        })
        .await?;

    Ok(StdResponse {
        data: Some(detail),
        message: Some("Returns recorded successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeating_the_current_status_changes_nothing() {
        // No restage, no fan-out, no ledger effects on a replayed update.
        assert_eq!(
            classify_transition(OrderDeliveryStatus::Accepted, OrderDeliveryStatus::Accepted),
            TransitionKind::Unchanged
        );
        assert_eq!(
            classify_transition(OrderDeliveryStatus::Completed, OrderDeliveryStatus::Completed),
            TransitionKind::Unchanged
        );
    }

    #[test]
    fn moves_are_classified_by_canonical_position() {
        assert_eq!(
            classify_transition(OrderDeliveryStatus::OrderPlaced, OrderDeliveryStatus::OnTheWay),
            TransitionKind::Forward
        );
        assert_eq!(
            classify_transition(OrderDeliveryStatus::OnTheWay, OrderDeliveryStatus::Accepted),
            TransitionKind::Backward
        );
    }

    #[test]
    fn money_fields_reject_garbage() {
        assert!(parse_money("payable_amount", "120.50").is_ok());
        assert!(parse_money("payable_amount", "12,50").is_err());
        assert!(parse_money("delivery_charge", "free").is_err());
    }
}
