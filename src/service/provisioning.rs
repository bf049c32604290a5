//! Provisioning orchestration.
//!
//! Every operation here talks to the panels first and persists second: a
//! subscription row only exists once at least one panel account is confirmed,
//! and fan-out operations report exactly which servers acknowledged. The
//! remote panels stay the source of truth for account existence; the local
//! database is the source of truth for budgets and lifecycle status.

use chrono::{DateTime, Duration, Utc};
use rand::distr::{Alphanumeric, SampleString};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::LinkConfig;
use crate::data::plan::PlanRepository;
use crate::data::server::ServerRepository;
use crate::data::subscription::{CreateSubscriptionParams, SubscriptionRepository};
use crate::error::AppError;
use crate::panel::types::{AccountSpec, AccountUpdate};
use crate::panel::{base_url, PanelRegistry};
use crate::service::lifecycle::WarningMarkers;

const USERNAME_PREFIX: &str = "rb_";
const USERNAME_SUFFIX_LEN: usize = 12;

/// Outcome of an operation fanned out across a subscription's servers.
///
/// Callers decide what a partial result means: most mutations go through with
/// at least one acknowledgement, deletes proceed locally regardless.
#[derive(Clone, Debug, Default)]
pub struct FanoutReport {
    pub succeeded: Vec<i32>,
    pub failed: Vec<(i32, String)>,
}

impl FanoutReport {
    pub fn any_succeeded(&self) -> bool {
        !self.succeeded.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn success(&mut self, server_id: i32) {
        self.succeeded.push(server_id);
    }

    fn failure(&mut self, server_id: i32, reason: impl Into<String>) {
        self.failed.push((server_id, reason.into()));
    }
}

/// Usage rolled up across every server a subscription lives on.
#[derive(Clone, Debug)]
pub struct AggregatedStats {
    /// Highest used-traffic value any member reported.
    pub used_traffic: i64,
    pub total_traffic: i64,
    pub expire_at: Option<DateTime<Utc>>,
    /// True if any member reports the account online.
    pub online: bool,
    pub reporting_servers: usize,
    pub member_servers: usize,
}

/// Generates a fresh account identity: a prefixed random username plus a v4
/// uuid. The same pair is used on every server the subscription spans.
pub fn generate_identity() -> (String, String) {
    let suffix = Alphanumeric
        .sample_string(&mut rand::rng(), USERNAME_SUFFIX_LEN)
        .to_lowercase();
    let username = format!("{}{}", USERNAME_PREFIX, suffix);
    let uuid = uuid::Uuid::new_v4().to_string();

    (username, uuid)
}

/// Expiry for a plan purchased now. Zero duration means no time limit.
pub fn plan_expiry(plan: &entity::plan::Model, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if plan.duration_days == 0 {
        None
    } else {
        Some(now + Duration::days(plan.duration_days as i64))
    }
}

/// New budget after applying a plan renewal.
///
/// Traffic accumulates: the plan allowance is added on top of the current
/// total (a zero allowance on either side means unlimited and stays zero).
/// Time extends from whichever is later, the current expiry or now, so
/// renewing early never shortens a subscription and renewing late never
/// backdates it.
pub fn compute_renewal(
    subscription: &entity::subscription::Model,
    plan: &entity::plan::Model,
    now: DateTime<Utc>,
) -> (i64, Option<DateTime<Utc>>) {
    let total_traffic = if plan.traffic_bytes == 0 || subscription.total_traffic == 0 {
        0
    } else {
        subscription.total_traffic + plan.traffic_bytes
    };

    let expire_at = if plan.duration_days == 0 {
        None
    } else {
        let base = match subscription.expire_at {
            Some(current) if current > now => current,
            _ => now,
        };
        Some(base + Duration::days(plan.duration_days as i64))
    };

    (total_traffic, expire_at)
}

#[derive(Clone)]
pub struct ProvisioningService {
    db: DatabaseConnection,
    registry: Arc<PanelRegistry>,
    links: LinkConfig,
    markers: WarningMarkers,
}

impl ProvisioningService {
    pub fn new(
        db: DatabaseConnection,
        registry: Arc<PanelRegistry>,
        links: LinkConfig,
        markers: WarningMarkers,
    ) -> Self {
        Self {
            db,
            registry,
            links,
            markers,
        }
    }

    /// Builds the connection URI for an account on a server when the panel
    /// did not hand one back.
    pub fn synthesize_uri(&self, server: &entity::server::Model, uuid: &str) -> String {
        match server.panel_kind.as_str() {
            "hiddify" => format!("{}/{}/all.txt", base_url(server), uuid),
            _ => format!(
                "vless://{}@{}:{}?type=tcp&security=reality&pbk={}&sni={}&sid={}&fp=chrome#{}",
                uuid,
                server.ip_address,
                self.links.reality_port,
                self.links.reality_public_key,
                self.links.reality_sni,
                self.links.reality_short_id,
                server.location_tag,
            ),
        }
    }

    /// Provisions a subscription on the least-loaded matching server.
    ///
    /// The panel account is created first; nothing is persisted if the panel
    /// rejects it. `max_devices` overrides the plan's device cap when given.
    ///
    /// # Returns
    /// - `Ok(Model)`: The persisted subscription
    /// - `Err(AppError::NotFound)`: Plan missing or no server has capacity
    /// - `Err(AppError::InternalError)`: Panel refused the account
    pub async fn create_single(
        &self,
        user_id: i32,
        plan_id: i32,
        location: Option<&str>,
        category: Option<&str>,
        max_devices: Option<i32>,
    ) -> Result<entity::subscription::Model, AppError> {
        let plan = self.load_plan(plan_id).await?;
        let max_devices = max_devices.unwrap_or(plan.max_devices);
        let server = ServerRepository::new(&self.db)
            .least_loaded(location, category)
            .await?
            .ok_or_else(|| {
                AppError::NotFound("No server with free capacity matches the request".to_string())
            })?;

        let (username, uuid) = generate_identity();
        let expire_at = plan_expiry(&plan, Utc::now());
        let spec = AccountSpec {
            username: username.clone(),
            uuid: uuid.clone(),
            traffic_limit: plan.traffic_bytes,
            expire_at,
            max_devices,
            note: Some(format!("user {}", user_id)),
            extra: None,
        };

        let client = self.registry.resolve(&server)?;
        let account = client.create_account(&server, &spec).await.ok_or_else(|| {
            AppError::InternalError(format!(
                "Panel account creation failed on server {}",
                server.id
            ))
        })?;

        let uri = account
            .links
            .into_iter()
            .next()
            .unwrap_or_else(|| self.synthesize_uri(&server, &uuid));

        let repo = SubscriptionRepository::new(&self.db);
        let subscription = repo
            .create(CreateSubscriptionParams {
                user_id,
                plan_id,
                server_id: Some(server.id),
                uuid,
                username,
                total_traffic: plan.traffic_bytes,
                expire_at,
                max_devices,
            })
            .await?;
        repo.add_link(subscription.id, server.id, uri).await?;
        ServerRepository::new(&self.db)
            .increment_active_users(server.id)
            .await?;

        Ok(subscription)
    }

    /// Provisions one shared identity across several servers.
    ///
    /// Servers that reject the account are reported, not fatal; the
    /// subscription persists with links to every server that confirmed. With
    /// zero confirmations nothing is persisted and the call fails.
    /// `max_devices` overrides the plan's device cap when given.
    pub async fn create_multi(
        &self,
        user_id: i32,
        plan_id: i32,
        server_ids: &[i32],
        max_devices: Option<i32>,
    ) -> Result<(entity::subscription::Model, FanoutReport), AppError> {
        let plan = self.load_plan(plan_id).await?;
        let max_devices = max_devices.unwrap_or(plan.max_devices);
        let server_repo = ServerRepository::new(&self.db);

        let (username, uuid) = generate_identity();
        let expire_at = plan_expiry(&plan, Utc::now());
        let spec = AccountSpec {
            username: username.clone(),
            uuid: uuid.clone(),
            traffic_limit: plan.traffic_bytes,
            expire_at,
            max_devices,
            note: Some(format!("user {}", user_id)),
            extra: None,
        };

        let mut report = FanoutReport::default();
        let mut confirmed: Vec<(entity::server::Model, String)> = Vec::new();

        for server_id in server_ids {
            let Some(server) = server_repo.get_by_id(*server_id).await? else {
                report.failure(*server_id, "server not found");
                continue;
            };

            let client = match self.registry.resolve(&server) {
                Ok(client) => client,
                Err(e) => {
                    report.failure(server.id, e.to_string());
                    continue;
                }
            };

            match client.create_account(&server, &spec).await {
                Some(account) => {
                    let uri = account
                        .links
                        .into_iter()
                        .next()
                        .unwrap_or_else(|| self.synthesize_uri(&server, &uuid));
                    report.success(server.id);
                    confirmed.push((server, uri));
                }
                None => {
                    report.failure(server.id, "panel rejected account creation");
                }
            }
        }

        if confirmed.is_empty() {
            return Err(AppError::InternalError(
                "No server accepted the account; nothing was provisioned".to_string(),
            ));
        }

        let repo = SubscriptionRepository::new(&self.db);
        let subscription = repo
            .create(CreateSubscriptionParams {
                user_id,
                plan_id,
                server_id: None,
                uuid,
                username,
                total_traffic: plan.traffic_bytes,
                expire_at,
                max_devices,
            })
            .await?;

        for (server, uri) in confirmed {
            repo.add_link(subscription.id, server.id, uri).await?;
            server_repo.increment_active_users(server.id).await?;
        }

        if !report.is_complete() {
            tracing::warn!(
                "Subscription {} provisioned on {}/{} servers",
                subscription.id,
                report.succeeded.len(),
                server_ids.len()
            );
        }

        Ok((subscription, report))
    }

    /// Applies a plan renewal: pushes the new budget to every member server,
    /// then persists it. At least one server must acknowledge, otherwise the
    /// local budget is left untouched.
    pub async fn renew(
        &self,
        subscription_id: i32,
        plan_id: i32,
    ) -> Result<FanoutReport, AppError> {
        let subscription = self.load_subscription(subscription_id).await?;
        let plan = self.load_plan(plan_id).await?;

        let (total_traffic, expire_at) = compute_renewal(&subscription, &plan, Utc::now());
        let update = AccountUpdate {
            traffic_limit: Some(total_traffic),
            expire_at,
            ..Default::default()
        };

        let repo = SubscriptionRepository::new(&self.db);
        let mut report = FanoutReport::default();

        for server in repo.member_servers(&subscription).await? {
            let client = match self.registry.resolve(&server) {
                Ok(client) => client,
                Err(e) => {
                    report.failure(server.id, e.to_string());
                    continue;
                }
            };

            let id = client.account_id(&subscription);
            if client.update_account(&server, id, &update).await.is_some() {
                report.success(server.id);
            } else {
                report.failure(server.id, "panel rejected budget update");
            }
        }

        if !report.any_succeeded() {
            return Err(AppError::InternalError(format!(
                "No server accepted the renewal for subscription {}",
                subscription_id
            )));
        }

        repo.update_budget(subscription_id, total_traffic, expire_at)
            .await?;
        if subscription.status != "active" {
            repo.update_status(subscription_id, "active").await?;
        }

        Ok(report)
    }

    /// Enables or disables the account on every member server. Persists the
    /// new status once at least one server acknowledges; disabling also drops
    /// any outstanding usage warnings so a re-enable starts clean.
    pub async fn set_enabled(
        &self,
        subscription_id: i32,
        enabled: bool,
    ) -> Result<FanoutReport, AppError> {
        let subscription = self.load_subscription(subscription_id).await?;
        let repo = SubscriptionRepository::new(&self.db);
        let mut report = FanoutReport::default();

        for server in repo.member_servers(&subscription).await? {
            let client = match self.registry.resolve(&server) {
                Ok(client) => client,
                Err(e) => {
                    report.failure(server.id, e.to_string());
                    continue;
                }
            };

            let id = client.account_id(&subscription);
            if client.set_enabled(&server, id, enabled).await {
                report.success(server.id);
            } else {
                report.failure(server.id, "panel did not acknowledge");
            }
        }

        if !report.any_succeeded() {
            return Err(AppError::InternalError(format!(
                "No server acknowledged the state change for subscription {}",
                subscription_id
            )));
        }

        let status = if enabled { "active" } else { "disabled" };
        repo.update_status(subscription_id, status).await?;

        if !enabled {
            self.markers.clear_subscription(subscription_id);
        }

        Ok(report)
    }

    /// Removes the subscription everywhere. Local removal is unconditional:
    /// servers that fail the remote delete are reported as orphans and logged,
    /// but never block the local cleanup.
    pub async fn delete_subscription(
        &self,
        subscription_id: i32,
    ) -> Result<FanoutReport, AppError> {
        let subscription = self.load_subscription(subscription_id).await?;
        let repo = SubscriptionRepository::new(&self.db);
        let server_repo = ServerRepository::new(&self.db);
        let mut report = FanoutReport::default();

        for server in repo.member_servers(&subscription).await? {
            let client = match self.registry.resolve(&server) {
                Ok(client) => client,
                Err(e) => {
                    report.failure(server.id, e.to_string());
                    continue;
                }
            };

            let id = client.account_id(&subscription);
            if client.delete_account(&server, id).await {
                server_repo.decrement_active_users(server.id).await?;
                report.success(server.id);
            } else {
                tracing::warn!(
                    "Orphan panel account {} left on server {} after failed delete",
                    id,
                    server.id
                );
                report.failure(server.id, "remote delete failed, account orphaned");
            }
        }

        repo.delete(subscription_id).await?;
        self.markers.clear_subscription(subscription_id);

        Ok(report)
    }

    /// Moves a single-server subscription to another server, keeping its
    /// identity and remaining budget.
    ///
    /// The old account is removed first so the shared identity is free, then
    /// recreated on the target. If the target refuses, the account is put
    /// back on the original server and the local state is left unchanged.
    pub async fn relocate(
        &self,
        subscription_id: i32,
        target_server_id: i32,
    ) -> Result<entity::subscription::Model, AppError> {
        let subscription = self.load_subscription(subscription_id).await?;
        let Some(old_server_id) = subscription.server_id else {
            return Err(AppError::BadRequest(
                "Only single-server subscriptions can be relocated".to_string(),
            ));
        };

        let server_repo = ServerRepository::new(&self.db);
        let old_server = server_repo
            .get_by_id(old_server_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Server {} not found", old_server_id)))?;
        let new_server = server_repo
            .get_by_id(target_server_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Server {} not found", target_server_id)))?;

        let old_client = self.registry.resolve(&old_server)?;
        let new_client = self.registry.resolve(&new_server)?;

        // The new panel gets what is left of the budget; the local row keeps
        // the full accounting.
        let remaining = if subscription.total_traffic == 0 {
            0
        } else {
            (subscription.total_traffic - subscription.used_traffic).max(0)
        };
        let spec = AccountSpec {
            username: subscription.username.clone(),
            uuid: subscription.uuid.clone(),
            traffic_limit: remaining,
            expire_at: subscription.expire_at,
            max_devices: subscription.max_devices,
            note: Some(format!("user {}", subscription.user_id)),
            extra: None,
        };

        let old_id = old_client.account_id(&subscription);
        if !old_client.delete_account(&old_server, old_id).await {
            tracing::warn!(
                "Could not remove account {} from server {} before relocation",
                old_id,
                old_server.id
            );
        }

        match new_client.create_account(&new_server, &spec).await {
            Some(account) => {
                let uri = account
                    .links
                    .into_iter()
                    .next()
                    .unwrap_or_else(|| self.synthesize_uri(&new_server, &subscription.uuid));

                let repo = SubscriptionRepository::new(&self.db);
                repo.set_server(subscription_id, Some(new_server.id)).await?;
                repo.replace_links(subscription_id, vec![(new_server.id, uri)])
                    .await?;
                server_repo.decrement_active_users(old_server.id).await?;
                server_repo.increment_active_users(new_server.id).await?;

                let relocated = self.load_subscription(subscription_id).await?;
                Ok(relocated)
            }
            None => {
                if old_client.create_account(&old_server, &spec).await.is_none() {
                    tracing::error!(
                        "Relocation of subscription {} failed and the account could not be \
                         restored on server {}",
                        subscription_id,
                        old_server.id
                    );
                }
                Err(AppError::InternalError(format!(
                    "Server {} refused the account; subscription {} stays on server {}",
                    new_server.id, subscription_id, old_server.id
                )))
            }
        }
    }

    /// Adds one more server to a multi-server subscription.
    pub async fn add_server(
        &self,
        subscription_id: i32,
        server_id: i32,
    ) -> Result<entity::subscription_link::Model, AppError> {
        let subscription = self.load_subscription(subscription_id).await?;
        if subscription.server_id.is_some() {
            return Err(AppError::BadRequest(
                "Pinned subscriptions move with relocate, not add".to_string(),
            ));
        }

        let repo = SubscriptionRepository::new(&self.db);
        let links = repo.links(subscription_id).await?;
        if links.iter().any(|link| link.server_id == server_id) {
            return Err(AppError::BadRequest(format!(
                "Subscription {} already spans server {}",
                subscription_id, server_id
            )));
        }

        let server_repo = ServerRepository::new(&self.db);
        let server = server_repo
            .get_by_id(server_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Server {} not found", server_id)))?;

        let spec = AccountSpec {
            username: subscription.username.clone(),
            uuid: subscription.uuid.clone(),
            traffic_limit: subscription.total_traffic,
            expire_at: subscription.expire_at,
            max_devices: subscription.max_devices,
            note: Some(format!("user {}", subscription.user_id)),
            extra: None,
        };

        let client = self.registry.resolve(&server)?;
        let account = client.create_account(&server, &spec).await.ok_or_else(|| {
            AppError::InternalError(format!(
                "Panel account creation failed on server {}",
                server.id
            ))
        })?;

        let uri = account
            .links
            .into_iter()
            .next()
            .unwrap_or_else(|| self.synthesize_uri(&server, &subscription.uuid));
        let link = repo.add_link(subscription_id, server.id, uri).await?;
        server_repo.increment_active_users(server.id).await?;

        Ok(link)
    }

    /// Removes a server from a multi-server subscription. The last member
    /// cannot be removed; delete the subscription instead.
    pub async fn remove_server(
        &self,
        subscription_id: i32,
        server_id: i32,
    ) -> Result<(), AppError> {
        let subscription = self.load_subscription(subscription_id).await?;
        let repo = SubscriptionRepository::new(&self.db);

        let links = repo.links(subscription_id).await?;
        if !links.iter().any(|link| link.server_id == server_id) {
            return Err(AppError::NotFound(format!(
                "Subscription {} has no link to server {}",
                subscription_id, server_id
            )));
        }
        if links.len() <= 1 {
            return Err(AppError::BadRequest(
                "A subscription must keep at least one server".to_string(),
            ));
        }

        let server_repo = ServerRepository::new(&self.db);
        if let Some(server) = server_repo.get_by_id(server_id).await? {
            match self.registry.resolve(&server) {
                Ok(client) => {
                    let id = client.account_id(&subscription);
                    if client.delete_account(&server, id).await {
                        server_repo.decrement_active_users(server.id).await?;
                    } else {
                        tracing::warn!(
                            "Orphan panel account {} left on server {} after removal",
                            id,
                            server.id
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "Cannot reach panel on server {} during removal: {}",
                        server.id,
                        e
                    );
                }
            }
        }

        repo.delete_link(subscription_id, server_id).await?;

        Ok(())
    }

    /// Pushes a new device cap to every member server, persisting it once at
    /// least one acknowledges.
    pub async fn update_max_devices(
        &self,
        subscription_id: i32,
        max_devices: i32,
    ) -> Result<FanoutReport, AppError> {
        let subscription = self.load_subscription(subscription_id).await?;
        let repo = SubscriptionRepository::new(&self.db);
        let update = AccountUpdate {
            max_devices: Some(max_devices),
            ..Default::default()
        };

        let mut report = FanoutReport::default();
        for server in repo.member_servers(&subscription).await? {
            let client = match self.registry.resolve(&server) {
                Ok(client) => client,
                Err(e) => {
                    report.failure(server.id, e.to_string());
                    continue;
                }
            };

            let id = client.account_id(&subscription);
            if client.update_account(&server, id, &update).await.is_some() {
                report.success(server.id);
            } else {
                report.failure(server.id, "panel rejected device cap update");
            }
        }

        if !report.any_succeeded() {
            return Err(AppError::InternalError(format!(
                "No server accepted the device cap for subscription {}",
                subscription_id
            )));
        }

        repo.update_max_devices(subscription_id, max_devices).await?;

        Ok(report)
    }

    /// Zeroes the consumed traffic on every member server, then locally.
    pub async fn reset_traffic(&self, subscription_id: i32) -> Result<FanoutReport, AppError> {
        let subscription = self.load_subscription(subscription_id).await?;
        let repo = SubscriptionRepository::new(&self.db);

        let mut report = FanoutReport::default();
        for server in repo.member_servers(&subscription).await? {
            let client = match self.registry.resolve(&server) {
                Ok(client) => client,
                Err(e) => {
                    report.failure(server.id, e.to_string());
                    continue;
                }
            };

            let id = client.account_id(&subscription);
            if client.reset_traffic(&server, id).await {
                report.success(server.id);
            } else {
                report.failure(server.id, "panel did not reset traffic");
            }
        }

        if !report.any_succeeded() {
            return Err(AppError::InternalError(format!(
                "No server reset traffic for subscription {}",
                subscription_id
            )));
        }

        repo.update_used_traffic(subscription_id, 0).await?;
        self.markers.clear_subscription(subscription_id);

        Ok(report)
    }

    /// Rolls up live usage across every member server. Servers that do not
    /// answer are simply not counted; the highest observed usage wins because
    /// panels only ever under-report after a restart.
    pub async fn aggregated_stats(
        &self,
        subscription_id: i32,
    ) -> Result<AggregatedStats, AppError> {
        let subscription = self.load_subscription(subscription_id).await?;
        let repo = SubscriptionRepository::new(&self.db);
        let members = repo.member_servers(&subscription).await?;

        let mut used_traffic = subscription.used_traffic;
        let mut online = false;
        let mut reporting = 0;

        for server in &members {
            let client = match self.registry.resolve(server) {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!("Skipping server {} in stats rollup: {}", server.id, e);
                    continue;
                }
            };

            let id = client.account_id(&subscription);
            if let Some(stats) = client.get_account_stats(server, id).await {
                used_traffic = used_traffic.max(stats.used_traffic);
                online = online || stats.online;
                reporting += 1;
            }
        }

        Ok(AggregatedStats {
            used_traffic,
            total_traffic: subscription.total_traffic,
            expire_at: subscription.expire_at,
            online,
            reporting_servers: reporting,
            member_servers: members.len(),
        })
    }

    async fn load_plan(&self, plan_id: i32) -> Result<entity::plan::Model, AppError> {
        PlanRepository::new(&self.db)
            .get_by_id(plan_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Plan {} not found", plan_id)))
    }

    async fn load_subscription(
        &self,
        subscription_id: i32,
    ) -> Result<entity::subscription::Model, AppError> {
        SubscriptionRepository::new(&self.db)
            .get_by_id(subscription_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Subscription {} not found", subscription_id))
            })
    }
}
