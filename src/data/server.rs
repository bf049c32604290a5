use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

use crate::error::AppError;

/// Checks the joint region/category placement constraint.
///
/// Entry-category servers sit inside the restricted region; exit and direct
/// servers sit outside it. Any other combination is a caller mistake.
pub fn validate_placement(region: &str, category: &str) -> Result<(), AppError> {
    match (category, region) {
        ("tunnel_entry", "iran") => Ok(()),
        ("tunnel_exit", "foreign") | ("direct", "foreign") => Ok(()),
        ("tunnel_entry", _) | ("tunnel_exit", _) | ("direct", _) => Err(AppError::BadRequest(
            format!("Category {} is not allowed in region {}", category, region),
        )),
        _ => Err(AppError::BadRequest(format!(
            "Unknown server category: {}",
            category
        ))),
    }
}

pub struct CreateServerParams {
    pub name: String,
    pub flag_emoji: Option<String>,
    pub ip_address: String,
    pub api_domain: String,
    pub admin_user: Option<String>,
    pub admin_pass: Option<String>,
    pub api_key: Option<String>,
    pub panel_kind: String,
    pub capacity: i32,
    pub location_tag: String,
    pub region: String,
    pub server_category: String,
    pub is_active: bool,
    pub is_central: bool,
}

#[derive(Default)]
pub struct UpdateServerParams {
    pub name: Option<String>,
    pub flag_emoji: Option<Option<String>>,
    pub ip_address: Option<String>,
    pub api_domain: Option<String>,
    pub admin_user: Option<Option<String>>,
    pub admin_pass: Option<Option<String>>,
    pub api_key: Option<Option<String>>,
    pub capacity: Option<i32>,
    pub location_tag: Option<String>,
    pub region: Option<String>,
    pub server_category: Option<String>,
    pub is_active: Option<bool>,
    pub is_central: Option<bool>,
}

pub struct ServerRepository<'a> {
    db: &'a DatabaseConnection,
}

impl<'a> ServerRepository<'a> {
    pub fn new(db: &'a DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a server after validating the region/category combination.
    ///
    /// Setting `is_central` clears the flag on every other server first, so at
    /// most one central server exists at any time.
    ///
    /// # Returns
    /// - `Ok(Model)`: The created server
    /// - `Err(AppError::BadRequest)`: Rejected region/category combination
    /// - `Err(AppError::DbErr)`: Database error
    pub async fn create(
        &self,
        params: CreateServerParams,
    ) -> Result<entity::server::Model, AppError> {
        validate_placement(&params.region, &params.server_category)?;

        if params.is_central {
            self.clear_central().await?;
        }

        let now = Utc::now();
        let server = entity::server::ActiveModel {
            id: ActiveValue::NotSet,
            name: ActiveValue::Set(params.name),
            flag_emoji: ActiveValue::Set(params.flag_emoji),
            ip_address: ActiveValue::Set(params.ip_address),
            api_domain: ActiveValue::Set(params.api_domain),
            admin_user: ActiveValue::Set(params.admin_user),
            admin_pass: ActiveValue::Set(params.admin_pass),
            api_key: ActiveValue::Set(params.api_key),
            panel_kind: ActiveValue::Set(params.panel_kind),
            capacity: ActiveValue::Set(params.capacity),
            active_users_count: ActiveValue::Set(0),
            location_tag: ActiveValue::Set(params.location_tag),
            region: ActiveValue::Set(params.region),
            server_category: ActiveValue::Set(params.server_category),
            is_active: ActiveValue::Set(params.is_active),
            is_central: ActiveValue::Set(params.is_central),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        }
        .insert(self.db)
        .await?;

        Ok(server)
    }

    /// Updates a server, re-validating the resulting region/category pair and
    /// enforcing the at-most-one-central rule when the flag is being set.
    pub async fn update(
        &self,
        id: i32,
        params: UpdateServerParams,
    ) -> Result<entity::server::Model, AppError> {
        let server = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Server {} not found", id)))?;

        let region = params.region.clone().unwrap_or_else(|| server.region.clone());
        let category = params
            .server_category
            .clone()
            .unwrap_or_else(|| server.server_category.clone());
        validate_placement(&region, &category)?;

        if params.is_central == Some(true) && !server.is_central {
            self.clear_central().await?;
        }

        let mut active: entity::server::ActiveModel = server.into();
        if let Some(name) = params.name {
            active.name = ActiveValue::Set(name);
        }
        if let Some(flag_emoji) = params.flag_emoji {
            active.flag_emoji = ActiveValue::Set(flag_emoji);
        }
        if let Some(ip_address) = params.ip_address {
            active.ip_address = ActiveValue::Set(ip_address);
        }
        if let Some(api_domain) = params.api_domain {
            active.api_domain = ActiveValue::Set(api_domain);
        }
        if let Some(admin_user) = params.admin_user {
            active.admin_user = ActiveValue::Set(admin_user);
        }
        if let Some(admin_pass) = params.admin_pass {
            active.admin_pass = ActiveValue::Set(admin_pass);
        }
        if let Some(api_key) = params.api_key {
            active.api_key = ActiveValue::Set(api_key);
        }
        if let Some(capacity) = params.capacity {
            active.capacity = ActiveValue::Set(capacity);
        }
        if let Some(location_tag) = params.location_tag {
            active.location_tag = ActiveValue::Set(location_tag);
        }
        active.region = ActiveValue::Set(region);
        active.server_category = ActiveValue::Set(category);
        if let Some(is_active) = params.is_active {
            active.is_active = ActiveValue::Set(is_active);
        }
        if let Some(is_central) = params.is_central {
            active.is_central = ActiveValue::Set(is_central);
        }
        active.updated_at = ActiveValue::Set(Utc::now());

        let server = active.update(self.db).await?;
        Ok(server)
    }

    async fn clear_central(&self) -> Result<(), DbErr> {
        entity::prelude::Server::update_many()
            .col_expr(entity::server::Column::IsCentral, Expr::value(false))
            .filter(entity::server::Column::IsCentral.eq(true))
            .exec(self.db)
            .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: i32) -> Result<Option<entity::server::Model>, DbErr> {
        entity::prelude::Server::find_by_id(id).one(self.db).await
    }

    pub async fn all_active(&self) -> Result<Vec<entity::server::Model>, DbErr> {
        entity::prelude::Server::find()
            .filter(entity::server::Column::IsActive.eq(true))
            .all(self.db)
            .await
    }

    /// Active servers with free headroom, least-loaded first.
    ///
    /// # Arguments
    /// - `location`: optional locality tag filter
    /// - `category`: optional traffic-direction category filter
    pub async fn available_servers(
        &self,
        location: Option<&str>,
        category: Option<&str>,
    ) -> Result<Vec<entity::server::Model>, DbErr> {
        let mut query = entity::prelude::Server::find()
            .filter(entity::server::Column::IsActive.eq(true))
            .filter(
                Expr::col(entity::server::Column::ActiveUsersCount)
                    .lt(Expr::col(entity::server::Column::Capacity)),
            )
            .order_by_asc(entity::server::Column::ActiveUsersCount);

        if let Some(location) = location {
            query = query.filter(entity::server::Column::LocationTag.eq(location));
        }
        if let Some(category) = category {
            query = query.filter(entity::server::Column::ServerCategory.eq(category));
        }

        query.all(self.db).await
    }

    /// Head of `available_servers`, or `None` when nothing is eligible.
    pub async fn least_loaded(
        &self,
        location: Option<&str>,
        category: Option<&str>,
    ) -> Result<Option<entity::server::Model>, DbErr> {
        Ok(self
            .available_servers(location, category)
            .await?
            .into_iter()
            .next())
    }

    /// Distinct locality tags that currently have at least one available server.
    pub async fn available_locations(&self) -> Result<Vec<String>, DbErr> {
        entity::prelude::Server::find()
            .filter(entity::server::Column::IsActive.eq(true))
            .filter(
                Expr::col(entity::server::Column::ActiveUsersCount)
                    .lt(Expr::col(entity::server::Column::Capacity)),
            )
            .select_only()
            .column(entity::server::Column::LocationTag)
            .distinct()
            .into_tuple::<String>()
            .all(self.db)
            .await
    }

    /// Bumps the advisory active-account counter after a confirmed create.
    pub async fn increment_active_users(&self, id: i32) -> Result<(), DbErr> {
        entity::prelude::Server::update_many()
            .col_expr(
                entity::server::Column::ActiveUsersCount,
                Expr::col(entity::server::Column::ActiveUsersCount).add(1),
            )
            .filter(entity::server::Column::Id.eq(id))
            .exec(self.db)
            .await?;

        Ok(())
    }

    /// Lowers the advisory counter after a confirmed delete, floored at zero.
    pub async fn decrement_active_users(&self, id: i32) -> Result<(), DbErr> {
        entity::prelude::Server::update_many()
            .col_expr(
                entity::server::Column::ActiveUsersCount,
                Expr::col(entity::server::Column::ActiveUsersCount).sub(1),
            )
            .filter(entity::server::Column::Id.eq(id))
            .filter(entity::server::Column::ActiveUsersCount.gt(0))
            .exec(self.db)
            .await?;

        Ok(())
    }

    /// Overwrites the advisory counter from live panel-reported truth.
    /// Last write wins against foreground increments; the counter is advisory.
    pub async fn set_active_users(&self, id: i32, count: i32) -> Result<(), DbErr> {
        entity::prelude::Server::update_many()
            .col_expr(
                entity::server::Column::ActiveUsersCount,
                Expr::value(count),
            )
            .filter(entity::server::Column::Id.eq(id))
            .exec(self.db)
            .await?;

        Ok(())
    }
}
