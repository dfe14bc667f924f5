use anyhow::{Context, anyhow};
use bigdecimal::BigDecimal;
use diesel::{ExpressionMethods, QueryDsl, SelectableHelper};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    aliases::DieselError,
    app_error::AppError,
    choices::{OrderDeliveryStatus, OrderStage},
    models::{
        CreateOrderDeliveryEntity, CreateOrderEntity, CreateTransactionEntity,
        OrderDeliveryEntity, OrderEntity, OrderProductEntity, ProductEntity,
        ReturnOrderProductEntity, TransactionEntity,
    },
    pricing, serial,
    schema::{order_deliveries, order_products, orders, products, return_order_products, transactions},
};

#[derive(Serialize, ToSchema)]
pub struct OrderProductRes {
    pub order_product: OrderProductEntity,
    pub product: ProductEntity,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub final_price_with_offset: BigDecimal,
}

#[derive(Serialize, ToSchema)]
pub struct OrderDetailRes {
    pub order: OrderEntity,
    pub order_products: Vec<OrderProductRes>,
    pub delivery_statuses: Vec<OrderDeliveryEntity>,
    /// Returns recorded by the customer after delivery.
    pub partial_return_products: Vec<ReturnOrderProductEntity>,
    /// Quantities the merchant held back from a delivery.
    pub partial_delivery_products: Vec<ReturnOrderProductEntity>,
}

/// Full order representation: snapshotted lines, the per-status delivery
/// rows and the return ledger split by who initiated the return.
pub async fn load_order_detail(
    conn: &mut AsyncPgConnection,
    order: OrderEntity,
) -> Result<OrderDetailRes, AppError> {
    let lines: Vec<(OrderProductEntity, ProductEntity)> = order_products::table
        .inner_join(products::table)
        .filter(order_products::order_id.eq(order.id))
        .select((OrderProductEntity::as_select(), ProductEntity::as_select()))
        .get_results(conn)
        .await
        .context("Failed to get order products")?;

    let delivery_statuses: Vec<OrderDeliveryEntity> = order_deliveries::table
        .filter(order_deliveries::order_id.eq(order.id))
        .order_by(order_deliveries::id.asc())
        .select(OrderDeliveryEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get delivery statuses")?;

    let returns: Vec<ReturnOrderProductEntity> = return_order_products::table
        .filter(return_order_products::order_id.eq(order.id))
        .order_by(return_order_products::created_at.desc())
        .select(ReturnOrderProductEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get return products")?;

    let (partial_delivery_products, partial_return_products): (Vec<_>, Vec<_>) = returns
        .into_iter()
        .partition(|record| record.is_return_by_merchant);

    let order_products = lines
        .into_iter()
        .map(|(order_product, product)| {
            let final_price_with_offset = order_product.final_price_with_offset();
            OrderProductRes {
                order_product,
                product,
                final_price_with_offset,
            }
        })
        .collect();

    Ok(OrderDetailRes {
        order,
        order_products,
        delivery_statuses,
        partial_return_products,
        partial_delivery_products,
    })
}

/// Inserts the order with a freshly generated serial number, retrying on
/// a serial collision. Each attempt runs in a savepoint so a collision
/// does not poison the surrounding transaction.
pub async fn insert_order_with_serial(
    conn: &mut AsyncPgConnection,
    mut create: CreateOrderEntity,
) -> Result<OrderEntity, AppError> {
    for _ in 0..serial::MAX_SERIAL_ATTEMPTS {
        create.serial_number = serial::generate();
        let attempt = &create;
        let result = conn
            .transaction::<OrderEntity, DieselError, _>(|conn| {
                Box::pin(async move {
                    diesel::insert_into(orders::table)
                        .values(attempt)
                        .returning(OrderEntity::as_returning())
                        .get_result(conn)
                        .await
                })
            })
            .await;

        match result {
            Ok(order) => return Ok(order),
            Err(err) if serial::is_unique_violation(&err) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Err(AppError::Other(anyhow!(
        "Could not allocate a unique order serial number"
    )))
}

/// Appends the ledger row recorded when an order completes (or is created
/// already fulfilled by a merchant).
pub async fn insert_transaction_for_order(
    conn: &mut AsyncPgConnection,
    order: &OrderEntity,
) -> Result<TransactionEntity, AppError> {
    let mut create = CreateTransactionEntity {
        organization_id: order.organization_id,
        customer_id: order.customer_id,
        order_id: Some(order.id),
        total_money: order.total_price.clone(),
        payable_money: order.payable_amount.clone(),
        serial_number: 0,
        note: String::new(),
    };

    for _ in 0..serial::MAX_SERIAL_ATTEMPTS {
        create.serial_number = serial::generate();
        let attempt = &create;
        let result = conn
            .transaction::<TransactionEntity, DieselError, _>(|conn| {
                Box::pin(async move {
                    diesel::insert_into(transactions::table)
                        .values(attempt)
                        .returning(TransactionEntity::as_returning())
                        .get_result(conn)
                        .await
                })
            })
            .await;

        match result {
            Ok(transaction) => return Ok(transaction),
            Err(err) if serial::is_unique_violation(&err) => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Err(AppError::Other(anyhow!(
        "Could not allocate a unique transaction serial number"
    )))
}

/// Atomic conditional decrement; returns false when the product lacks
/// stock. Never read-then-write, so two concurrent checkouts cannot both
/// take the last unit.
pub async fn decrement_stock(
    conn: &mut AsyncPgConnection,
    product_id: i32,
    quantity: i32,
) -> Result<bool, AppError> {
    let updated = diesel::update(
        products::table
            .filter(products::id.eq(product_id))
            .filter(products::stock.ge(quantity)),
    )
    .set(products::stock.eq(products::stock - quantity))
    .execute(conn)
    .await
    .context("Failed to decrement product stock")?;

    Ok(updated == 1)
}

/// Pre-populates the per-status delivery rows for a new order. A normal
/// order starts at ORDER_PLACED; a merchant-recorded, already fulfilled
/// sale gets its history marked COMPLETED with COMPLETED as the current
/// stage, and never passes through the return/cancel statuses.
pub async fn create_delivery_rows(
    conn: &mut AsyncPgConnection,
    order_id: i32,
    already_fulfilled: bool,
) -> Result<(), AppError> {
    let mut rows = Vec::with_capacity(OrderDeliveryStatus::ALL.len());
    for status in OrderDeliveryStatus::ALL {
        let stage = if already_fulfilled {
            match status {
                OrderDeliveryStatus::Returned
                | OrderDeliveryStatus::Canceled
                | OrderDeliveryStatus::PartialDelivery => continue,
                OrderDeliveryStatus::Completed => OrderStage::Current,
                _ => OrderStage::Completed,
            }
        } else if status == OrderDeliveryStatus::OrderPlaced {
            OrderStage::Current
        } else {
            OrderStage::Pending
        };

        rows.push(CreateOrderDeliveryEntity {
            order_id,
            status: status.as_str().to_string(),
            stage: stage.as_str().to_string(),
        });
    }

    diesel::insert_into(order_deliveries::table)
        .values(rows)
        .execute(conn)
        .await
        .context("Failed to create delivery statuses")?;

    Ok(())
}

/// The single CURRENT delivery row of an order. Zero rows is a broken
/// order; more than one is a fatal consistency violation that must not be
/// silently repaired.
pub async fn current_delivery_status(
    conn: &mut AsyncPgConnection,
    order_id: i32,
) -> Result<OrderDeliveryEntity, AppError> {
    let mut current: Vec<OrderDeliveryEntity> = order_deliveries::table
        .filter(order_deliveries::order_id.eq(order_id))
        .filter(order_deliveries::stage.eq(OrderStage::Current.as_str()))
        .select(OrderDeliveryEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get the current delivery stage")?;

    match current.len() {
        1 => Ok(current.remove(0)),
        0 => Err(AppError::BadRequest(
            "Cannot find the order-delivery current stage".into(),
        )),
        count => Err(AppError::Consistency(format!(
            "Order {order_id} has {count} CURRENT delivery rows"
        ))),
    }
}

/// Order total from the still-active line quantities plus the delivery
/// charge; the recomputation every return and charge edit goes through.
pub async fn recompute_total_price(
    conn: &mut AsyncPgConnection,
    order_id: i32,
    delivery_charge: &BigDecimal,
) -> Result<BigDecimal, AppError> {
    let lines: Vec<OrderProductEntity> = order_products::table
        .filter(order_products::order_id.eq(order_id))
        .select(OrderProductEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get order products for price recomputation")?;

    let line_totals: Vec<BigDecimal> = lines
        .iter()
        .map(OrderProductEntity::final_price_with_offset)
        .collect();

    Ok(pricing::order_total(line_totals.iter(), delivery_charge))
}
