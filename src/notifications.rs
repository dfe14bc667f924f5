use anyhow::Context;
use diesel::{ExpressionMethods, QueryDsl, QueryResult, SelectableHelper};
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde_json::{Value, json};

use crate::{
    aliases::DieselError,
    app_error::AppError,
    choices::{ActionType, NotificationEnable, OrganizationRole},
    models::{
        CreateNotificationConnectorEntity, CreateNotificationEntity, NotificationEntity,
        NotificationPreferenceEntity, OrganizationUserEntity,
    },
    schema::{
        notification_connectors, notification_preferences, notification_receivers, notifications,
        organization_users,
    },
};

/// Closed set of entities a notification can point at. Each variant knows
/// its model-type tag and which per-user preference flag gates delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notifiable {
    User(i32),
    Organization(i32),
    OrganizationUser(i32),
    Product(i32),
    Order(i32),
    OrderDelivery(i32),
    Transaction(i32),
}

impl Notifiable {
    pub fn model_type(&self) -> &'static str {
        match self {
            Notifiable::User(_) => "USER",
            Notifiable::Organization(_) => "ORGANIZATION",
            Notifiable::OrganizationUser(_) => "ORGANIZATION_USER",
            Notifiable::Product(_) => "PRODUCT",
            Notifiable::Order(_) => "ORDER",
            Notifiable::OrderDelivery(_) => "ORDER_DELIVERY",
            Notifiable::Transaction(_) => "TRANSACTION",
        }
    }

    pub fn preference_enabled(&self, preference: &NotificationPreferenceEntity) -> bool {
        let flag = match self {
            Notifiable::User(_) => &preference.enable_user,
            Notifiable::Organization(_) => &preference.enable_organization,
            Notifiable::OrganizationUser(_) => &preference.enable_organization_user,
            Notifiable::Product(_) => &preference.enable_product,
            Notifiable::Order(_) => &preference.enable_order,
            Notifiable::OrderDelivery(_) => &preference.enable_order_delivery,
            Notifiable::Transaction(_) => &preference.enable_transaction,
        };
        flag == NotificationEnable::On.as_str()
    }

    fn connector(&self, notification_id: i32) -> CreateNotificationConnectorEntity {
        let mut connector = CreateNotificationConnectorEntity {
            notification_id,
            ..Default::default()
        };
        match *self {
            Notifiable::User(id) => connector.user_id = Some(id),
            Notifiable::Organization(id) => connector.organization_id = Some(id),
            Notifiable::OrganizationUser(id) => connector.organization_user_id = Some(id),
            Notifiable::Product(id) => connector.product_id = Some(id),
            Notifiable::Order(id) => connector.order_id = Some(id),
            Notifiable::OrderDelivery(id) => connector.order_delivery_id = Some(id),
            Notifiable::Transaction(id) => connector.transaction_id = Some(id),
        }
        connector
    }
}

/// `{field: {"previous": .., "current": ..}}` snapshot recorded on CHANGE
/// notifications.
pub fn changed_field(field: &str, previous: impl Into<Value>, current: impl Into<Value>) -> Value {
    json!({ field: { "previous": previous.into(), "current": current.into() } })
}

/// Creates audit notifications and fans them out to the organization's
/// staff. Runs on the caller's transaction connection, so a failure here
/// rolls back the business mutation that triggered it.
pub struct NotificationService {
    organization_id: i32,
    created_by_id: i32,
}

impl NotificationService {
    pub fn new(organization_id: i32, created_by_id: i32) -> Self {
        Self {
            organization_id,
            created_by_id,
        }
    }

    /// Creates the notification plus its entity connector and delivers it
    /// to every staff member whose preference for the target's model type
    /// is on. Customers are never part of this broadcast; use
    /// [`NotificationService::send_to_users`] for them.
    pub async fn notify_organization_users(
        &self,
        conn: &mut AsyncPgConnection,
        target: Notifiable,
        action_type: ActionType,
        changed_data: Value,
        message: &str,
    ) -> Result<NotificationEntity, AppError> {
        let notification: NotificationEntity = diesel::insert_into(notifications::table)
            .values(CreateNotificationEntity {
                organization_id: self.organization_id,
                created_by_id: self.created_by_id,
                changed_data,
                is_success: true,
                message: message.to_string(),
                action_type: action_type.as_str().to_string(),
                model_type: target.model_type().to_string(),
            })
            .returning(NotificationEntity::as_returning())
            .get_result(conn)
            .await
            .context("Failed to create notification")?;

        diesel::insert_into(notification_connectors::table)
            .values(target.connector(notification.id))
            .execute(conn)
            .await
            .context("Failed to create notification connector")?;

        let staff: Vec<OrganizationUserEntity> = organization_users::table
            .filter(organization_users::organization_id.eq(self.organization_id))
            .filter(organization_users::role.ne(OrganizationRole::Customer.as_str()))
            .select(OrganizationUserEntity::as_select())
            .get_results(conn)
            .await
            .context("Failed to get organization staff")?;

        for member in staff {
            if self.preference_allows(conn, member.user_id, target).await? {
                self.create_receiver(conn, notification.id, member.user_id)
                    .await?;
            }
        }

        Ok(notification)
    }

    /// Delivers an existing notification to explicit recipients (e.g. the
    /// customer whose order changed), bypassing the preference check.
    pub async fn send_to_users(
        &self,
        conn: &mut AsyncPgConnection,
        notification_id: i32,
        user_ids: &[i32],
    ) -> Result<(), AppError> {
        for user_id in user_ids {
            self.create_receiver(conn, notification_id, *user_id).await?;
        }
        Ok(())
    }

    /// Looks up the per-user per-organization preference row, lazily
    /// creating it with everything on when missing.
    async fn preference_allows(
        &self,
        conn: &mut AsyncPgConnection,
        user_id: i32,
        target: Notifiable,
    ) -> Result<bool, AppError> {
        let preference: QueryResult<NotificationPreferenceEntity> =
            notification_preferences::table
                .filter(notification_preferences::organization_id.eq(self.organization_id))
                .filter(notification_preferences::user_id.eq(user_id))
                .select(NotificationPreferenceEntity::as_select())
                .get_result(conn)
                .await;

        match preference {
            Ok(preference) => Ok(target.preference_enabled(&preference)),
            Err(DieselError::NotFound) => {
                diesel::insert_into(notification_preferences::table)
                    .values((
                        notification_preferences::user_id.eq(user_id),
                        notification_preferences::organization_id.eq(self.organization_id),
                    ))
                    .on_conflict_do_nothing()
                    .execute(conn)
                    .await
                    .context("Failed to create default notification preference")?;
                Ok(true)
            }
            Err(err) => Err(AppError::Other(err.into())),
        }
    }

    async fn create_receiver(
        &self,
        conn: &mut AsyncPgConnection,
        notification_id: i32,
        user_id: i32,
    ) -> Result<(), AppError> {
        diesel::insert_into(notification_receivers::table)
            .values((
                notification_receivers::notification_id.eq(notification_id),
                notification_receivers::user_id.eq(user_id),
                notification_receivers::is_read.eq(false),
            ))
            .on_conflict_do_nothing()
            .execute(conn)
            .await
            .context("Failed to create notification receiver")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn preference_with(flag: &str, value: &str) -> NotificationPreferenceEntity {
        let on = NotificationEnable::On.as_str().to_string();
        let mut preference = NotificationPreferenceEntity {
            id: 1,
            user_id: 1,
            organization_id: 1,
            enable_user: on.clone(),
            enable_product: on.clone(),
            enable_order: on.clone(),
            enable_order_delivery: on.clone(),
            enable_organization: on.clone(),
            enable_organization_user: on.clone(),
            enable_transaction: on,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let slot = match flag {
            "order" => &mut preference.enable_order,
            "order_delivery" => &mut preference.enable_order_delivery,
            "transaction" => &mut preference.enable_transaction,
            other => panic!("unknown flag {other}"),
        };
        *slot = value.to_string();
        preference
    }

    #[test]
    fn every_target_declares_its_model_type() {
        assert_eq!(Notifiable::Order(1).model_type(), "ORDER");
        assert_eq!(Notifiable::OrderDelivery(1).model_type(), "ORDER_DELIVERY");
        assert_eq!(Notifiable::Transaction(1).model_type(), "TRANSACTION");
        assert_eq!(
            Notifiable::OrganizationUser(1).model_type(),
            "ORGANIZATION_USER"
        );
    }

    #[test]
    fn preference_flag_is_keyed_by_model_type() {
        let pref = preference_with("order", "OFF");
        assert!(!Notifiable::Order(1).preference_enabled(&pref));
        assert!(Notifiable::OrderDelivery(1).preference_enabled(&pref));

        let pref = preference_with("transaction", "OFF BY ADMIN");
        assert!(!Notifiable::Transaction(1).preference_enabled(&pref));
        assert!(Notifiable::Order(1).preference_enabled(&pref));
    }

    #[test]
    fn connector_points_at_exactly_one_entity() {
        let connector = Notifiable::OrderDelivery(7).connector(42);
        assert_eq!(connector.notification_id, 42);
        assert_eq!(connector.order_delivery_id, Some(7));
        assert_eq!(connector.order_id, None);
        assert_eq!(connector.transaction_id, None);
    }

    #[test]
    fn changed_field_records_previous_and_current() {
        let data = changed_field("status", "ORDER_PLACED", "ACCEPTED");
        assert_eq!(data["status"]["previous"], "ORDER_PLACED");
        assert_eq!(data["status"]["current"], "ACCEPTED");
    }
}
