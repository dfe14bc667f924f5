use std::collections::HashMap;

use anyhow::Context;
use axum::{
    Extension,
    extract::{Path, State},
    response::IntoResponse,
};
use bigdecimal::BigDecimal;
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::RunQueryDsl;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    aliases::DieselError,
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, Actor, Tenant},
    models::{CartEntity, CartProductEntity, CreateCartEntity, ProductEntity},
    pricing,
    schema::{cart_products, carts, products},
};

/// Customer cart routes. Each customer has at most one implicit cart per
/// organization, resolved from the tenant context.
pub fn routes_with_openapi(state: AppState) -> OpenApiRouter<AppState> {
    utoipa_axum::router::OpenApiRouter::new().nest(
        "/customers/cart",
        OpenApiRouter::new()
            .routes(utoipa_axum::routes!(get_cart))
            .routes(utoipa_axum::routes!(add_product))
            .routes(utoipa_axum::routes!(remove_product))
            .route_layer(axum::middleware::from_fn_with_state(
                state,
                middleware::customers_authorization,
            )),
    )
}

#[derive(Serialize, ToSchema)]
struct CartProductRes {
    product: ProductEntity,
    quantity: i32,
    /// Product discount plus the customer's offset, in percent.
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    total_discount: BigDecimal,
    /// Live line total for the discounted quantity.
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    total_price: BigDecimal,
}

#[derive(Serialize, ToSchema)]
struct GetCartRes {
    cart: CartEntity,
    products: Vec<CartProductRes>,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    total_price: BigDecimal,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    discount_offset: BigDecimal,
}

/// Prices cart lines with live product data; cart totals are never
/// snapshotted.
fn price_cart_lines(
    lines: &[CartProductEntity],
    catalog: &HashMap<i32, ProductEntity>,
    discount_offset: &BigDecimal,
) -> (Vec<CartProductRes>, BigDecimal) {
    let mut priced = Vec::with_capacity(lines.len());
    let mut line_totals = Vec::with_capacity(lines.len());

    for line in lines {
        let Some(product) = catalog.get(&line.product_id) else {
            continue;
        };
        let total_discount =
            pricing::effective_discount(&product.discount_price, discount_offset);
        let unit = pricing::unit_price_after_discount(&product.selling_price, &total_discount);
        let total_price = pricing::line_total(&unit, line.quantity);
        line_totals.push(total_price.clone());
        priced.push(CartProductRes {
            product: product.clone(),
            quantity: line.quantity,
            total_discount,
            total_price,
        });
    }

    let total = pricing::order_total(line_totals.iter(), &BigDecimal::from(0));
    (priced, total)
}

async fn load_cart_detail(
    state: &AppState,
    cart: CartEntity,
    discount_offset: &BigDecimal,
) -> Result<GetCartRes, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

    let lines: Vec<CartProductEntity> = cart_products::table
        .filter(cart_products::cart_id.eq(cart.id))
        .order_by(cart_products::created_at.desc())
        .select(CartProductEntity::as_select())
        .get_results(conn)
        .await
        .context("Failed to get cart products")?;

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

    let (priced, total_price) = price_cart_lines(&lines, &catalog, discount_offset);

    Ok(GetCartRes {
        cart,
        products: priced,
        total_price,
        discount_offset: discount_offset.clone(),
    })
}

/// Fetch the customer's cart in the tenant organization.
#[utoipa::path(
    get,
    path = "/",
    tags = ["Carts"],
    responses(
        (status = 200, description = "Get cart successfully", body = StdResponse<GetCartRes, String>),
        (status = 404, description = "No cart exists yet")
    )
)]
async fn get_cart(
    State(state): State<AppState>,
    Extension(Tenant(organization)): Extension<Tenant>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

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

    let detail = load_cart_detail(&state, cart, &actor.discount_offset).await?;

    Ok(StdResponse {
        data: Some(detail),
        message: Some("Get cart successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
struct AddCartProductReq {
    product_id: i32,
    #[schema(minimum = 1)]
    quantity: i32,
}

/// Add a product to the cart or replace its quantity.
#[utoipa::path(
    post,
    path = "/products",
    tags = ["Carts"],
    request_body = AddCartProductReq,
    responses(
        (status = 200, description = "Cart product upserted", body = StdResponse<GetCartRes, String>),
        (status = 400, description = "Wrong organization or insufficient stock")
    )
)]
async fn add_product(
    State(state): State<AppState>,
    Extension(Tenant(organization)): Extension<Tenant>,
    Extension(actor): Extension<Actor>,
    axum::Json(body): axum::Json<AddCartProductReq>,
) -> Result<impl IntoResponse, AppError> {
    if body.quantity < 1 {
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

    let product: QueryResult<ProductEntity> = products::table
        .find(body.product_id)
        .select(ProductEntity::as_select())
        .get_result(conn)
        .await;

    let product = match product {
        Ok(product) => product,
        Err(DieselError::NotFound) => return Err(AppError::NotFound),
        Err(err) => return Err(AppError::Other(err.into())),
    };

    if product.organization_id != organization.id {
        return Err(AppError::field_validation(
            "product",
            format!(
                "This product is not {} organization's product",
                organization.name
            ),
        ));
    }
    if product.stock < body.quantity {
        return Err(AppError::field_validation(
            "quantity",
            format!("Insufficient stock for {}", product.name),
        ));
    }

    let cart: CartEntity = diesel::insert_into(carts::table)
        .values(CreateCartEntity {
            customer_id: actor.user_id,
            organization_id: organization.id,
        })
        .on_conflict((carts::customer_id, carts::organization_id))
        .do_update()
        .set(carts::updated_at.eq(diesel::dsl::now))
        .returning(CartEntity::as_returning())
        .get_result(conn)
        .await
        .context("Failed to get or create cart")?;

    // Replaces the quantity, it does not add to it.
    diesel::insert_into(cart_products::table)
        .values((
            cart_products::cart_id.eq(cart.id),
            cart_products::product_id.eq(product.id),
            cart_products::quantity.eq(body.quantity),
        ))
        .on_conflict((cart_products::cart_id, cart_products::product_id))
        .do_update()
        .set(cart_products::quantity.eq(body.quantity))
        .execute(conn)
        .await
        .context("Failed to upsert cart product")?;

    let detail = load_cart_detail(&state, cart, &actor.discount_offset).await?;

    Ok(StdResponse {
        data: Some(detail),
        message: Some("Cart product upserted successfully"),
    })
}

/// Remove a product from the cart.
#[utoipa::path(
    delete,
    path = "/products/{product_id}",
    tags = ["Carts"],
    params(
        ("product_id" = i32, Path, description = "Product ID to remove from the cart")
    ),
    responses(
        (status = 200, description = "Cart product removed", body = StdResponse<CartProductEntity, String>)
    )
)]
async fn remove_product(
    Path(product_id): Path<i32>,
    State(state): State<AppState>,
    Extension(Tenant(organization)): Extension<Tenant>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, AppError> {
    let conn = &mut state
        .db_pool
        .get()
        .await
        .context("Failed to obtain a DB connection pool")?;

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

    let removed: QueryResult<CartProductEntity> = diesel::delete(
        cart_products::table
            .filter(cart_products::cart_id.eq(cart.id))
            .filter(cart_products::product_id.eq(product_id)),
    )
    .returning(CartProductEntity::as_returning())
    .get_result(conn)
    .await;

    match removed {
        Ok(removed) => Ok(StdResponse {
            data: Some(removed),
            message: Some("Cart product removed successfully"),
        }),
        Err(DieselError::NotFound) => Err(AppError::NotFound),
        Err(err) => Err(AppError::Other(err.into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn product(id: i32, price: &str, discount: &str) -> ProductEntity {
        ProductEntity {
            id,
            organization_id: 1,
            name: format!("Product {id}"),
            stock: 100,
            damage_stock: 0,
            selling_price: BigDecimal::from_str(price).unwrap(),
            discount_price: BigDecimal::from_str(discount).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn line(product_id: i32, quantity: i32) -> CartProductEntity {
        CartProductEntity {
            id: product_id,
            cart_id: 1,
            product_id,
            quantity,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn cart_total_stacks_product_discount_with_customer_offset() {
        let catalog = HashMap::from([(1, product(1, "100.00", "10"))]);
        let offset = BigDecimal::from_str("10").unwrap();

        let (priced, total) = price_cart_lines(&[line(1, 2)], &catalog, &offset);
        assert_eq!(priced.len(), 1);
        assert_eq!(priced[0].total_discount, BigDecimal::from_str("20").unwrap());
        assert_eq!(total, BigDecimal::from_str("160.00").unwrap());
    }

    #[test]
    fn empty_cart_totals_to_zero() {
        let (priced, total) = price_cart_lines(&[], &HashMap::new(), &BigDecimal::from(0));
        assert!(priced.is_empty());
        assert_eq!(total, BigDecimal::from_str("0.00").unwrap());
    }
}
