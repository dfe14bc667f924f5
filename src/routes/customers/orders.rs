use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncConnection, RunQueryDsl};
use serde::Deserialize;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    aliases::DieselError,
    app_error::{AppError, StdResponse},
    app_state::AppState,
    choices::ActionType,
    middleware::{self, Actor, Tenant},
    models::{
        AddressSnapshot, CartEntity, CartProductEntity, CreateOrderEntity,
        CreateOrderProductEntity, OrderEntity, PaymentMethodEntity, ProductEntity,
    },
    notifications::{Notifiable, NotificationService},
    pricing,
    routes::shared::{self, OrderDetailRes},
    schema::{cart_products, carts, delivery_charges, order_products, orders, payment_methods, products},
    serial,
};

pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/customers/orders",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(create_order, get_my_orders))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::customers_authorization,
            )),
    )
}

/// Freezes a cart line onto the order. The full quantity starts both
/// active (`updated_quantity`, shrunk by returns) and scheduled for
/// delivery (`delivery_quantity`).
fn snapshot_line(
    order_id: i32,
    product: &ProductEntity,
    quantity: i32,
    discount_price: BigDecimal,
) -> CreateOrderProductEntity {
    CreateOrderProductEntity {
        order_id,
        product_id: product.id,
        selling_price: product.selling_price.clone(),
        discount_price,
        quantity,
        updated_quantity: quantity,
        delivery_quantity: quantity,
    }
}

#[derive(Deserialize, ToSchema)]
struct CreateOrderReq {
    address: AddressSnapshot,
    payment_method_id: i32,
    #[serde(default)]
    note: String,
    #[serde(default)]
    receiver_name: String,
    #[serde(default)]
    receiver_phone: String,
}

/// Checks out the customer's cart into an order.
///
/// Runs in one DB transaction: stock is decremented with conditional
/// updates (so a concurrent checkout cannot oversell), prices and the
/// discount percentage are snapshotted onto the order lines, the
/// delivery-status rows are pre-created with ORDER_PLACED current, and the
/// cart is emptied. Any failure rolls the whole thing back.
#[utoipa::path(
    post,
    path = "/",
    tags = ["Orders"],
    request_body = CreateOrderReq,
    responses(
        (status = 201, description = "Order placed", body = StdResponse<OrderDetailRes, String>),
        (status = 400, description = "Empty cart, unknown payment method or stocked-out products"),
        (status = 404, description = "No cart exists yet")
    )
)]
async fn create_order(
    State(state): State<AppState>,
    Extension(Tenant(organization)): Extension<Tenant>,
    Extension(actor): Extension<Actor>,
    axum::Json(body): axum::Json<CreateOrderReq>,
) -> Result<impl IntoResponse, AppError> {
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

                let cart: QueryResult<CartEntity> = carts::table
                    .filter(carts::customer_id.eq(actor.user_id))
                    .filter(carts::organization_id.eq(organization.id))
                    .select(CartEntity::as_select())
                    .get_result(conn)
                    .await;
                let cart = match cart {
                    Ok(cart) => cart,
                    Err(DieselError::NotFound) => return Err(AppError::NotFound),
                    Err(err) => return Err(AppError::Other(err.into())),
                };

                let lines: Vec<CartProductEntity> = cart_products::table
                    .filter(cart_products::cart_id.eq(cart.id))
                    .select(CartProductEntity::as_select())
                    .get_results(conn)
                    .await
                    .context("Failed to get cart products")?;
                if lines.is_empty() {
                    return Err(AppError::NotFound);
                }

                let product_ids: Vec<i32> = lines.iter().map(|line| line.product_id).collect();
                let catalog: HashMap<i32, ProductEntity> = products::table
                    .filter(products::id.eq_any(&product_ids))
                    .select(ProductEntity::as_select())
                    .get_results::<ProductEntity>(conn)
                    .await
                    .context("Failed to get cart catalog entries")?
                    .into_iter()
                    .map(|product| (product.id, product))
                    .collect();

                // Take stock for every line before failing, so the error
                // can name all stocked-out products at once. The rollback
                // undoes the decrements of the lines that did fit.
                let mut stocked_out: Vec<String> = Vec::new();
                for line in &lines {
                    let Some(product) = catalog.get(&line.product_id) else {
                        return Err(AppError::Consistency(format!(
                            "Cart {} references missing product {}",
                            cart.id, line.product_id
                        )));
                    };
                    if !shared::decrement_stock(conn, product.id, line.quantity).await? {
                        stocked_out.push(product.name.clone());
                    }
                }
                if !stocked_out.is_empty() {
                    return Err(AppError::BadRequest(format!(
                        "These products are stocked out: {}",
                        stocked_out.join(", ")
                    )));
                }

                let district = body.address.district.clone();
                let delivery_charge: QueryResult<BigDecimal> = delivery_charges::table
                    .filter(delivery_charges::organization_id.eq(organization.id))
                    .filter(delivery_charges::district.eq(&district))
                    .select(delivery_charges::charge)
                    .get_result(conn)
                    .await;
                let delivery_charge = match delivery_charge {
                    Ok(charge) => charge,
                    Err(DieselError::NotFound) => organization.delivery_charge.clone(),
                    Err(err) => return Err(AppError::Other(err.into())),
                };

                let mut undiscounted_totals = Vec::with_capacity(lines.len());
                let mut discounted_totals = Vec::with_capacity(lines.len());
                let mut line_snapshots = Vec::with_capacity(lines.len());
                for line in &lines {
                    let product = &catalog[&line.product_id];
                    let discount = pricing::effective_discount(
                        &product.discount_price,
                        &actor.discount_offset,
                    );
                    let unit = pricing::unit_price_after_discount(&product.selling_price, &discount);
                    undiscounted_totals
                        .push(pricing::line_total(&product.selling_price, line.quantity));
                    discounted_totals.push(pricing::line_total(&unit, line.quantity));
                    line_snapshots.push((product.id, discount));
                }

                let order_price =
                    pricing::order_total(undiscounted_totals.iter(), &BigDecimal::from(0));
                let total_price = pricing::order_total(discounted_totals.iter(), &delivery_charge);

                let order = shared::insert_order_with_serial(
                    conn,
                    CreateOrderEntity {
                        serial_number: serial::generate(),
                        customer_id: actor.user_id,
                        ordered_by_id: actor.user_id,
                        organization_id: organization.id,
                        order_price,
                        total_price: total_price.clone(),
                        payable_amount: total_price,
                        discount_offset: actor.discount_offset.clone(),
                        address: serde_json::to_value(&body.address)
                            .context("Failed to serialize the address snapshot")?,
                        completed: false,
                        note: body.note,
                        delivery_charge,
                        receiver_name: body.receiver_name,
                        receiver_phone: body.receiver_phone,
                        payment_method_id: payment_method.id,
                    },
                )
                .await?;

                let order_lines: Vec<CreateOrderProductEntity> = lines
                    .iter()
                    .zip(line_snapshots)
                    .map(|(line, (product_id, discount))| {
                        snapshot_line(order.id, &catalog[&product_id], line.quantity, discount)
                    })
                    .collect();
                diesel::insert_into(order_products::table)
                    .values(order_lines)
                    .execute(conn)
                    .await
                    .context("Failed to create order products")?;

                shared::create_delivery_rows(conn, order.id, false).await?;

                diesel::delete(cart_products::table.filter(cart_products::cart_id.eq(cart.id)))
                    .execute(conn)
                    .await
                    .context("Failed to empty the cart")?;
                diesel::delete(carts::table.find(cart.id))
                    .execute(conn)
                    .await
                    .context("Failed to delete the cart")?;

                let notifier = NotificationService::new(organization.id, actor.user_id);
                let notification = notifier
                    .notify_organization_users(
                        conn,
                        Notifiable::Order(order.id),
                        ActionType::Addition,
                        serde_json::json!({}),
                        &format!("Order #{} has been placed", order.serial_number),
                    )
                    .await?;
                notifier
                    .send_to_users(conn, notification.id, &[actor.user_id])
                    .await?;

                shared::load_order_detail(conn, order).await
            })
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        StdResponse {
            data: Some(detail),
            message: Some("Order placed successfully"),
        },
    ))
}

/// The customer's own orders in the tenant organization, newest first.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Orders"],
    responses(
        (status = 200, description = "Get orders successfully", body = StdResponse<Vec<OrderDetailRes>, String>)
    )
)]
async fn get_my_orders(
    State(state): State<AppState>,
    Extension(Tenant(organization)): Extension<Tenant>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let my_orders: Vec<OrderEntity> = orders::table
        .filter(orders::organization_id.eq(organization.id))
        .filter(orders::customer_id.eq(actor.user_id))
        .order_by(orders::created_at.desc())
        .select(OrderEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get orders")?;

    let mut details = Vec::with_capacity(my_orders.len());
    for order in my_orders {
        details.push(shared::load_order_detail(conn, order).await?);
    }

    Ok(StdResponse {
        data: Some(details),
        message: Some("Get orders successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    #[test]
    fn checkout_lines_start_fully_active_and_scheduled() {
        let product = ProductEntity {
            id: 7,
            organization_id: 1,
            name: "Napa".into(),
            stock: 10,
            damage_stock: 0,
            selling_price: BigDecimal::from_str("100.00").unwrap(),
            discount_price: BigDecimal::from_str("10").unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let line = snapshot_line(3, &product, 4, BigDecimal::from_str("20").unwrap());
        assert_eq!(line.order_id, 3);
        assert_eq!(line.quantity, 4);
        assert_eq!(line.updated_quantity, 4);
        assert_eq!(line.delivery_quantity, 4);
        assert_eq!(line.selling_price, BigDecimal::from_str("100.00").unwrap());
        assert_eq!(line.discount_price, BigDecimal::from_str("20").unwrap());
    }
}
