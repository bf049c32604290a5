//! Background reconciliation of subscription state against the panels.
//!
//! These routines run from the scheduler. They tolerate any single panel
//! being down: per-server failures are logged and skipped, never propagated,
//! so one dead server cannot stall the whole sweep.

use chrono::Utc;
use sea_orm::DatabaseConnection;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::data::server::ServerRepository;
use crate::data::subscription::SubscriptionRepository;
use crate::data::user::UserRepository;
use crate::error::AppError;
use crate::notify::Notifier;
use crate::panel::PanelRegistry;

/// Fraction of the traffic allowance below which the user is warned.
const TRAFFIC_WARNING_RATIO: f64 = 0.2;
/// Days before expiry at which the user is warned.
const EXPIRY_WARNING_DAYS: i64 = 3;
/// A traffic warning repeats at most once a day while the condition holds.
const TRAFFIC_WARNING_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Members lagging behind the maximum by less than this are left alone.
const TRAFFIC_SYNC_THRESHOLD: i64 = 1024 * 1024;

/// In-memory dedup of warning notifications.
///
/// Keys encode the subscription and condition; an entry suppresses repeats
/// until its deadline passes. State is process-local on purpose: after a
/// restart the worst case is one repeated warning.
#[derive(Clone, Default)]
pub struct WarningMarkers {
    inner: Arc<Mutex<HashMap<String, Instant>>>,
}

impl WarningMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the key if it is absent or expired. Returns `true` when the
    /// caller should send the warning.
    pub fn set_if_absent(&self, key: &str, ttl: Duration) -> bool {
        let mut markers = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let now = Instant::now();
        match markers.get(key) {
            Some(deadline) if *deadline > now => false,
            _ => {
                markers.insert(key.to_string(), now + ttl);
                true
            }
        }
    }

    /// Drops every marker belonging to a subscription, so it starts with a
    /// clean slate after a disable, reset or delete.
    pub fn clear_subscription(&self, subscription_id: i32) {
        let mut markers = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let traffic_key = traffic_warning_key(subscription_id);
        let expiry_prefix = format!("expiry_warning_{}_", subscription_id);
        markers.retain(|key, _| key != &traffic_key && !key.starts_with(&expiry_prefix));
    }
}

fn traffic_warning_key(subscription_id: i32) -> String {
    format!("traffic_warning_{}", subscription_id)
}

fn expiry_warning_key(subscription_id: i32, days_left: i64) -> String {
    format!("expiry_warning_{}_{}", subscription_id, days_left)
}

#[derive(Clone)]
pub struct LifecycleService {
    db: DatabaseConnection,
    registry: Arc<PanelRegistry>,
    notifier: Notifier,
    markers: WarningMarkers,
}

impl LifecycleService {
    pub fn new(
        db: DatabaseConnection,
        registry: Arc<PanelRegistry>,
        notifier: Notifier,
        markers: WarningMarkers,
    ) -> Self {
        Self {
            db,
            registry,
            notifier,
            markers,
        }
    }

    /// Refreshes used traffic for every active single-server subscription and
    /// warns users approaching their traffic or time limit. Multi-server
    /// subscriptions are covered by [`Self::sync_multi_server_traffic`].
    ///
    /// Warnings are deduplicated through [`WarningMarkers`].
    pub async fn monitor_usage(&self) -> Result<(), AppError> {
        let repo = SubscriptionRepository::new(&self.db);
        let subscriptions = repo.active_single_server().await?;
        let now = Utc::now();

        for subscription in subscriptions {
            let observed = self.max_observed_usage(&subscription).await?;
            let used = match observed {
                Some(used) if used > subscription.used_traffic => {
                    repo.update_used_traffic(subscription.id, used).await?;
                    used
                }
                Some(_) | None => subscription.used_traffic,
            };

            self.maybe_warn_traffic(&subscription, used).await?;
            self.maybe_warn_expiry(&subscription, now).await?;
        }

        Ok(())
    }

    /// Equalizes used traffic across the members of multi-server
    /// subscriptions.
    ///
    /// The highest observed value wins; members lagging by more than the sync
    /// threshold get the maximum pushed down, where the backend supports it.
    pub async fn sync_multi_server_traffic(&self) -> Result<(), AppError> {
        let repo = SubscriptionRepository::new(&self.db);

        for subscription in repo.active_multi_server().await? {
            let members = repo.member_servers(&subscription).await?;
            let mut readings: Vec<(entity::server::Model, i64)> = Vec::new();

            for server in members {
                let client = match self.registry.resolve(&server) {
                    Ok(client) => client,
                    Err(e) => {
                        tracing::warn!("Skipping server {} in traffic sync: {}", server.id, e);
                        continue;
                    }
                };

                let id = client.account_id(&subscription);
                if let Some(stats) = client.get_account_stats(&server, id).await {
                    readings.push((server, stats.used_traffic));
                }
            }

            let Some(max_used) = readings.iter().map(|(_, used)| *used).max() else {
                continue;
            };

            for (server, used) in &readings {
                if max_used - used <= TRAFFIC_SYNC_THRESHOLD {
                    continue;
                }

                let client = match self.registry.resolve(server) {
                    Ok(client) => client,
                    Err(_) => continue,
                };

                let id = client.account_id(&subscription);
                if !client.sync_used_traffic(server, id, max_used).await {
                    tracing::debug!(
                        "Server {} does not take usage writes, skipped in traffic sync",
                        server.id
                    );
                }
            }

            if max_used > subscription.used_traffic {
                repo.update_used_traffic(subscription.id, max_used).await?;
            }
        }

        Ok(())
    }

    /// Disables subscriptions that ran out of time or traffic and marks them
    /// expired. The local status flips even when no panel acknowledges, so an
    /// exhausted subscription never stays active in the database.
    pub async fn expire_overdue(&self) -> Result<(), AppError> {
        let repo = SubscriptionRepository::new(&self.db);
        let now = Utc::now();

        for subscription in repo.expiration_candidates(now).await? {
            let mut acknowledged = 0;
            for server in repo.member_servers(&subscription).await? {
                let client = match self.registry.resolve(&server) {
                    Ok(client) => client,
                    Err(e) => {
                        tracing::warn!("Cannot disable on server {}: {}", server.id, e);
                        continue;
                    }
                };

                let id = client.account_id(&subscription);
                if client.set_enabled(&server, id, false).await {
                    acknowledged += 1;
                } else {
                    tracing::warn!(
                        "Server {} did not acknowledge disabling account {}",
                        server.id,
                        id
                    );
                }
            }

            repo.update_status(subscription.id, "expired").await?;
            self.markers.clear_subscription(subscription.id);

            let out_of_time = subscription
                .expire_at
                .map(|expire_at| expire_at <= now)
                .unwrap_or(false);
            let reason = if out_of_time {
                "its time ran out"
            } else {
                "its traffic allowance is used up"
            };
            tracing::info!(
                "Subscription {} expired ({}), disabled on {} server(s)",
                subscription.id,
                reason,
                acknowledged
            );

            self.notify_user(
                subscription.user_id,
                format!(
                    "Your subscription {} has expired because {}.",
                    subscription.username, reason
                ),
            )
            .await?;
        }

        Ok(())
    }

    /// Removes subscriptions that have been expired for the retention window.
    ///
    /// Remote deletes are attempted once; accounts that survive are logged as
    /// orphans and the local rows are removed regardless.
    pub async fn cleanup_expired(&self) -> Result<(), AppError> {
        let repo = SubscriptionRepository::new(&self.db);
        let server_repo = ServerRepository::new(&self.db);

        for subscription in repo.cleanup_candidates(Utc::now()).await? {
            for server in repo.member_servers(&subscription).await? {
                let client = match self.registry.resolve(&server) {
                    Ok(client) => client,
                    Err(e) => {
                        tracing::warn!("Cannot clean up on server {}: {}", server.id, e);
                        continue;
                    }
                };

                let id = client.account_id(&subscription);
                if client.delete_account(&server, id).await {
                    server_repo.decrement_active_users(server.id).await?;
                } else {
                    tracing::warn!(
                        "Orphan panel account {} left on server {} during cleanup",
                        id,
                        server.id
                    );
                }
            }

            repo.delete(subscription.id).await?;
            self.markers.clear_subscription(subscription.id);
            tracing::info!("Cleaned up expired subscription {}", subscription.id);
        }

        Ok(())
    }

    /// Overwrites each server's advisory active-account counter with what its
    /// panel reports. Servers that do not answer keep their last value.
    pub async fn sync_user_counts(&self) -> Result<(), AppError> {
        let server_repo = ServerRepository::new(&self.db);

        for server in server_repo.all_active().await? {
            let client = match self.registry.resolve(&server) {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!("Skipping server {} in count sync: {}", server.id, e);
                    continue;
                }
            };

            let health = client.server_health(&server).await;
            if !health.is_online() {
                tracing::warn!(
                    "Server {} unreachable during count sync: {}",
                    server.id,
                    health.message.unwrap_or_default()
                );
                continue;
            }

            if let Some(count) = health.active_users.or(health.total_users) {
                let count = i32::try_from(count).unwrap_or(i32::MAX);
                server_repo.set_active_users(server.id, count).await?;
            }
        }

        Ok(())
    }

    async fn max_observed_usage(
        &self,
        subscription: &entity::subscription::Model,
    ) -> Result<Option<i64>, AppError> {
        let repo = SubscriptionRepository::new(&self.db);
        let mut max_used: Option<i64> = None;

        for server in repo.member_servers(subscription).await? {
            let client = match self.registry.resolve(&server) {
                Ok(client) => client,
                Err(e) => {
                    tracing::warn!("Skipping server {} in usage rollup: {}", server.id, e);
                    continue;
                }
            };

            let id = client.account_id(subscription);
            if let Some(stats) = client.get_account_stats(&server, id).await {
                max_used = Some(max_used.map_or(stats.used_traffic, |m| m.max(stats.used_traffic)));
            }
        }

        Ok(max_used)
    }

    async fn maybe_warn_traffic(
        &self,
        subscription: &entity::subscription::Model,
        used: i64,
    ) -> Result<(), AppError> {
        if subscription.total_traffic == 0 {
            return Ok(());
        }

        let remaining = (subscription.total_traffic - used).max(0);
        let ratio = remaining as f64 / subscription.total_traffic as f64;
        if ratio >= TRAFFIC_WARNING_RATIO {
            return Ok(());
        }

        let key = traffic_warning_key(subscription.id);
        if !self.markers.set_if_absent(&key, TRAFFIC_WARNING_TTL) {
            return Ok(());
        }

        let remaining_gb = remaining as f64 / (1024.0 * 1024.0 * 1024.0);
        self.notify_user(
            subscription.user_id,
            format!(
                "Your subscription {} has {:.1} GB of traffic left.",
                subscription.username, remaining_gb
            ),
        )
        .await
    }

    async fn maybe_warn_expiry(
        &self,
        subscription: &entity::subscription::Model,
        now: chrono::DateTime<Utc>,
    ) -> Result<(), AppError> {
        let Some(expire_at) = subscription.expire_at else {
            return Ok(());
        };
        if expire_at <= now {
            return Ok(());
        }

        let days_left = (expire_at - now).num_days();
        if days_left > EXPIRY_WARNING_DAYS {
            return Ok(());
        }

        // One warning per remaining-days value, so the user hears about day
        // three, day two and day one exactly once each.
        let key = expiry_warning_key(subscription.id, days_left);
        if !self.markers.set_if_absent(&key, TRAFFIC_WARNING_TTL) {
            return Ok(());
        }

        let text = if days_left == 0 {
            format!(
                "Your subscription {} expires in less than a day.",
                subscription.username
            )
        } else {
            format!(
                "Your subscription {} expires in {} day(s).",
                subscription.username, days_left
            )
        };
        self.notify_user(subscription.user_id, text).await
    }

    async fn notify_user(&self, user_id: i32, text: String) -> Result<(), AppError> {
        let user = UserRepository::new(&self.db).get_by_id(user_id).await?;
        match user.and_then(|u| u.chat_id) {
            Some(chat_id) => self.notifier.send(chat_id, text),
            None => tracing::debug!("User {} has no chat id, notification dropped", user_id),
        }

        Ok(())
    }
}
