use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder};

pub struct PlanRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> PlanRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<entity::plan::Model>, DbErr> {
        entity::prelude::Plan::find_by_id(id).one(self.db).await
    }

    pub async fn all_active(&self) -> Result<Vec<entity::plan::Model>, DbErr> {
        entity::prelude::Plan::find()
            .filter(entity::plan::Column::IsActive.eq(true))
            .order_by_asc(entity::plan::Column::Price)
            .all(self.db)
            .await
    }
}
