use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{Identifiable, Insertable, Queryable},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

// Tenancy & actors

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::organizations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrganizationEntity {
    pub id: i32,
    pub name: String,
    pub subdomain: String,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub delivery_charge: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserEntity {
    pub id: i32,
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::users)]
pub struct CreateUserEntity {
    pub phone: String,
    pub first_name: String,
    pub last_name: String,
}

/// Membership of a user in an organization, carrying the per-customer
/// negotiated discount offset.
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::organization_users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrganizationUserEntity {
    pub id: i32,
    pub organization_id: i32,
    pub user_id: i32,
    pub role: String,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub discount_offset: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::organization_users)]
pub struct CreateOrganizationUserEntity {
    pub organization_id: i32,
    pub user_id: i32,
    pub role: String,
    pub discount_offset: BigDecimal,
}

// Catalog

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductEntity {
    pub id: i32,
    pub organization_id: i32,
    pub name: String,
    pub stock: i32,
    pub damage_stock: i32,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub selling_price: BigDecimal,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub discount_price: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::payment_methods)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PaymentMethodEntity {
    pub id: i32,
    pub name: String,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::delivery_charges)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct DeliveryChargeEntity {
    pub id: i32,
    pub organization_id: i32,
    pub district: String,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub charge: BigDecimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Carts

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::carts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartEntity {
    pub id: i32,
    pub customer_id: i32,
    pub organization_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::carts)]
pub struct CreateCartEntity {
    pub customer_id: i32,
    pub organization_id: i32,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::cart_products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct CartProductEntity {
    pub id: i32,
    pub cart_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Orders

/// Address snapshot frozen onto an order at creation time. The district is
/// also the delivery-charge lookup key.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct AddressSnapshot {
    pub uid: Uuid,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub house_street: String,
    #[serde(default)]
    pub upazila: String,
    #[serde(default)]
    pub district: String,
    #[serde(default)]
    pub division: String,
    #[serde(default)]
    pub country: String,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i32,
    pub serial_number: i32,
    pub customer_id: i32,
    pub ordered_by_id: i32,
    pub organization_id: i32,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub order_price: BigDecimal,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub total_price: BigDecimal,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub payable_amount: BigDecimal,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub discount_offset: BigDecimal,
    #[schema(value_type = Object)]
    pub address: Value,
    pub completed: bool,
    pub note: String,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub delivery_charge: BigDecimal,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub payment_method_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::orders)]
pub struct CreateOrderEntity {
    pub serial_number: i32,
    pub customer_id: i32,
    pub ordered_by_id: i32,
    pub organization_id: i32,
    pub order_price: BigDecimal,
    pub total_price: BigDecimal,
    pub payable_amount: BigDecimal,
    pub discount_offset: BigDecimal,
    pub address: Value,
    pub completed: bool,
    pub note: String,
    pub delivery_charge: BigDecimal,
    pub receiver_name: String,
    pub receiver_phone: String,
    pub payment_method_id: i32,
}

/// Snapshot line of an order. `selling_price` and `discount_price` are
/// frozen at order time; `discount_price` already includes the customer
/// offset. `updated_quantity` shrinks as returns are recorded.
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::order_products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderProductEntity {
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub selling_price: BigDecimal,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub discount_price: BigDecimal,
    pub quantity: i32,
    pub updated_quantity: i32,
    pub delivery_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderProductEntity {
    /// Discounted value of the still-active quantity of this line.
    pub fn final_price_with_offset(&self) -> BigDecimal {
        let unit =
            crate::pricing::unit_price_after_discount(&self.selling_price, &self.discount_price);
        crate::pricing::line_total(&unit, self.updated_quantity)
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_products)]
pub struct CreateOrderProductEntity {
    pub order_id: i32,
    pub product_id: i32,
    pub selling_price: BigDecimal,
    pub discount_price: BigDecimal,
    pub quantity: i32,
    pub updated_quantity: i32,
    pub delivery_quantity: i32,
}

/// One row per possible delivery status per order. `stage` marks the row
/// as the active pointer (CURRENT), already passed (COMPLETED) or not yet
/// reached (PENDING); `updated_at` doubles as the audit timestamp for when
/// a status was last restaged.
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::order_deliveries)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderDeliveryEntity {
    pub id: i32,
    pub order_id: i32,
    pub status: String,
    pub stage: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_deliveries)]
pub struct CreateOrderDeliveryEntity {
    pub order_id: i32,
    pub status: String,
    pub stage: String,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::return_order_products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ReturnOrderProductEntity {
    pub id: i32,
    pub order_id: i32,
    pub order_product_id: i32,
    pub product_id: i32,
    pub organization_id: i32,
    pub returned_quantity: i32,
    pub is_return_by_merchant: bool,
    pub note: String,
    pub description: String,
    pub is_damage: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::return_order_products)]
pub struct CreateReturnOrderProductEntity {
    pub order_id: i32,
    pub order_product_id: i32,
    pub product_id: i32,
    pub organization_id: i32,
    pub returned_quantity: i32,
    pub is_return_by_merchant: bool,
    pub note: String,
    pub description: String,
    pub is_damage: bool,
}

// Ledger

/// Append-only money ledger row. Running balance over a customer's rows is
/// `sum(payable_money) - sum(total_money)`; negative means the customer
/// still owes money.
#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::transactions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TransactionEntity {
    pub id: i32,
    pub organization_id: i32,
    pub customer_id: i32,
    pub order_id: Option<i32>,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub total_money: BigDecimal,
    #[serde(with = "crate::pricing::money_string")]
    #[schema(value_type = String)]
    pub payable_money: BigDecimal,
    pub serial_number: i32,
    pub note: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::transactions)]
pub struct CreateTransactionEntity {
    pub organization_id: i32,
    pub customer_id: i32,
    pub order_id: Option<i32>,
    pub total_money: BigDecimal,
    pub payable_money: BigDecimal,
    pub serial_number: i32,
    pub note: String,
}

// Notifications

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::notifications)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationEntity {
    pub id: i32,
    pub organization_id: i32,
    pub created_by_id: i32,
    #[schema(value_type = Object)]
    pub changed_data: Value,
    pub is_success: bool,
    pub message: String,
    pub action_type: String,
    pub model_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::notifications)]
pub struct CreateNotificationEntity {
    pub organization_id: i32,
    pub created_by_id: i32,
    pub changed_data: Value,
    pub is_success: bool,
    pub message: String,
    pub action_type: String,
    pub model_type: String,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::notification_connectors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationConnectorEntity {
    pub id: i32,
    pub notification_id: i32,
    pub user_id: Option<i32>,
    pub organization_id: Option<i32>,
    pub organization_user_id: Option<i32>,
    pub product_id: Option<i32>,
    pub order_id: Option<i32>,
    pub order_delivery_id: Option<i32>,
    pub transaction_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Default)]
#[diesel(table_name = crate::schema::notification_connectors)]
pub struct CreateNotificationConnectorEntity {
    pub notification_id: i32,
    pub user_id: Option<i32>,
    pub organization_id: Option<i32>,
    pub organization_user_id: Option<i32>,
    pub product_id: Option<i32>,
    pub order_id: Option<i32>,
    pub order_delivery_id: Option<i32>,
    pub transaction_id: Option<i32>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::notification_receivers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationReceiverEntity {
    pub id: i32,
    pub notification_id: i32,
    pub user_id: i32,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Serialize, Debug, Clone, ToSchema)]
#[diesel(table_name = crate::schema::notification_preferences)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NotificationPreferenceEntity {
    pub id: i32,
    pub user_id: i32,
    pub organization_id: i32,
    pub enable_user: String,
    pub enable_product: String,
    pub enable_order: String,
    pub enable_order_delivery: String,
    pub enable_organization: String,
    pub enable_organization_user: String,
    pub enable_transaction: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
