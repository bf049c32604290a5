use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter,
};

pub struct AezaOrderRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> AezaOrderRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Records a freshly placed order as `pending`.
    pub async fn create(
        &self,
        order_id: String,
        meta: Option<serde_json::Value>,
    ) -> Result<entity::aeza_order::Model, DbErr> {
        let now = Utc::now();
        entity::aeza_order::ActiveModel {
            id: ActiveValue::NotSet,
            order_id: ActiveValue::Set(order_id),
            status: ActiveValue::Set("pending".to_string()),
            aeza_server_id: ActiveValue::NotSet,
            ip_address: ActiveValue::NotSet,
            root_password: ActiveValue::NotSet,
            error_message: ActiveValue::NotSet,
            meta: ActiveValue::Set(meta),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
        .insert(self.db)
        .await
    }

    pub async fn get_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<entity::aeza_order::Model>, DbErr> {
        entity::prelude::AezaOrder::find()
            .filter(entity::aeza_order::Column::OrderId.eq(order_id))
            .one(self.db)
            .await
    }

    /// Orders still awaiting delivery, for poll resumption after restart.
    pub async fn pending(&self) -> Result<Vec<entity::aeza_order::Model>, DbErr> {
        entity::prelude::AezaOrder::find()
            .filter(entity::aeza_order::Column::Status.eq("pending"))
            .all(self.db)
            .await
    }

    /// Flags delivery: the instance is reachable and its credentials are known.
    pub async fn mark_ready(
        &self,
        order: entity::aeza_order::Model,
        aeza_server_id: String,
        ip_address: String,
        root_password: Option<String>,
    ) -> Result<entity::aeza_order::Model, DbErr> {
        let mut active = order.into_active_model();
        active.status = ActiveValue::Set("ready".to_string());
        active.aeza_server_id = ActiveValue::Set(Some(aeza_server_id));
        active.ip_address = ActiveValue::Set(Some(ip_address));
        active.root_password = ActiveValue::Set(root_password);
        active.updated_at = ActiveValue::Set(Utc::now());
        active.update(self.db).await
    }

    pub async fn mark_failed(
        &self,
        order: entity::aeza_order::Model,
        error_message: String,
    ) -> Result<entity::aeza_order::Model, DbErr> {
        let mut active = order.into_active_model();
        active.status = ActiveValue::Set("failed".to_string());
        active.error_message = ActiveValue::Set(Some(error_message));
        active.updated_at = ActiveValue::Set(Utc::now());
        active.update(self.db).await
    }
}
