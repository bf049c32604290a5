//! VPS marketplace integration: placing orders, polling them to delivery,
//! and day-two server administration through the provider API.
//!
//! Unlike the panel clients, marketplace calls are foreground admin actions,
//! so they return proper errors instead of absorbing failures.

use sea_orm::DatabaseConnection;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::data::aeza_order::AezaOrderRepository;
use crate::error::AppError;
use crate::notify::Notifier;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_POLL_ATTEMPTS: u32 = 60;

/// Uniform provider envelope; `error` is set on business-level failures even
/// when the HTTP status is 200.
#[derive(Debug, Deserialize)]
struct AezaResponse {
    #[serde(default)]
    error: bool,
    message: Option<String>,
    response: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct AezaClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AezaClient {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    async fn request(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<serde_json::Value, AppError> {
        let response = builder
            .header("X-API-Key", &self.api_key)
            .send()
            .await?
            .json::<AezaResponse>()
            .await?;

        if response.error {
            return Err(AppError::InternalError(format!(
                "Provider rejected the request: {}",
                response.message.unwrap_or_else(|| "no detail".to_string())
            )));
        }

        Ok(response.response.unwrap_or(serde_json::Value::Null))
    }

    /// Places an order for a new instance.
    pub async fn create_order(
        &self,
        product_id: i64,
        term: &str,
        name: &str,
    ) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/services/orders", self.base_url);
        let body = json!({
            "productId": product_id,
            "term": term,
            "name": name,
            "autoProlong": false,
        });

        self.request(self.http.post(url).json(&body)).await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/services/orders/{}", self.base_url, order_id);
        self.request(self.http.get(url)).await
    }

    pub async fn get_server(&self, server_id: &str) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/services/{}", self.base_url, server_id);
        self.request(self.http.get(url)).await
    }

    /// Power control: `action` is one of `reboot`, `suspend` or `resume`.
    pub async fn control(
        &self,
        server_id: &str,
        action: &str,
    ) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/services/{}/ctl", self.base_url, server_id);
        self.request(self.http.post(url).json(&json!({ "action": action })))
            .await
    }

    pub async fn reinstall(
        &self,
        server_id: &str,
        os_id: i64,
    ) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/services/{}/reinstall", self.base_url, server_id);
        self.request(self.http.post(url).json(&json!({ "os": os_id })))
            .await
    }

    pub async fn change_password(
        &self,
        server_id: &str,
        password: &str,
    ) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/services/{}/changePassword", self.base_url, server_id);
        self.request(self.http.post(url).json(&json!({ "password": password })))
            .await
    }

    pub async fn delete_server(&self, server_id: &str) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/services/{}", self.base_url, server_id);
        self.request(self.http.delete(url)).await
    }

    pub async fn usage_charts(&self, server_id: &str) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/services/{}/charts", self.base_url, server_id);
        self.request(self.http.get(url)).await
    }

    pub async fn list_os(&self) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/os", self.base_url);
        self.request(self.http.get(url)).await
    }

    pub async fn list_products(&self) -> Result<serde_json::Value, AppError> {
        let url = format!("{}/services/products", self.base_url);
        self.request(self.http.get(url)).await
    }
}

/// What one poll of an order concluded.
enum PollOutcome {
    KeepWaiting,
    Done,
}

/// Polls pending marketplace orders until the instance is delivered.
///
/// Each order is polled on its own task at a fixed interval with an attempt
/// cap; the database row is the handover point, so anything that marks the
/// order non-pending stops the poller on its next tick.
#[derive(Clone)]
pub struct AezaPoller {
    db: DatabaseConnection,
    client: AezaClient,
    notifier: Notifier,
    interval: Duration,
    max_attempts: u32,
}

impl AezaPoller {
    pub fn new(db: DatabaseConnection, client: AezaClient, notifier: Notifier) -> Self {
        Self::with_schedule(
            db,
            client,
            notifier,
            DEFAULT_POLL_INTERVAL,
            DEFAULT_POLL_ATTEMPTS,
        )
    }

    /// Same poller with a custom cadence; tests tighten both knobs.
    pub fn with_schedule(
        db: DatabaseConnection,
        client: AezaClient,
        notifier: Notifier,
        interval: Duration,
        max_attempts: u32,
    ) -> Self {
        Self {
            db,
            client,
            notifier,
            interval,
            max_attempts,
        }
    }

    /// Spawns a polling task for the order.
    pub fn spawn(&self, order_id: String) {
        let poller = self.clone();
        tokio::spawn(async move {
            if let Err(e) = poller.poll_order(&order_id).await {
                tracing::error!("Polling order {} failed: {}", order_id, e);
            }
        });
    }

    /// Respawns polling tasks for every order still pending, called once at
    /// startup so a restart never strands an in-flight order.
    pub async fn resume_pending(&self) -> Result<usize, AppError> {
        let pending = AezaOrderRepository::new(&self.db).pending().await?;
        let count = pending.len();

        for order in pending {
            tracing::info!("Resuming poll for order {}", order.order_id);
            self.spawn(order.order_id);
        }

        Ok(count)
    }

    /// Polls one order until it is delivered, fails, or the attempt cap runs
    /// out. Checks the database before every provider call and stops as soon
    /// as the order is no longer pending, wherever that transition came from.
    pub async fn poll_order(&self, order_id: &str) -> Result<(), AppError> {
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.interval).await;
            }

            let repo = AezaOrderRepository::new(&self.db);
            let Some(order) = repo.get_by_order_id(order_id).await? else {
                tracing::warn!("Order {} vanished, stopping poll", order_id);
                return Ok(());
            };
            if !order.is_pending() {
                return Ok(());
            }

            match self.check_once(order).await {
                Ok(PollOutcome::Done) => return Ok(()),
                Ok(PollOutcome::KeepWaiting) => {}
                Err(e) => {
                    // Transient provider trouble; the next tick retries.
                    tracing::warn!("Order {} status check failed: {}", order_id, e);
                }
            }
        }

        let repo = AezaOrderRepository::new(&self.db);
        if let Some(order) = repo.get_by_order_id(order_id).await? {
            if order.is_pending() {
                let order_id = order.order_id.clone();
                let failed = repo
                    .mark_failed(order, "Delivery timed out".to_string())
                    .await?;
                tracing::error!("Order {} timed out waiting for delivery", order_id);
                self.notify_order(&failed, format!("VPS order {} timed out.", order_id));
            }
        }

        Ok(())
    }

    async fn check_once(
        &self,
        order: entity::aeza_order::Model,
    ) -> Result<PollOutcome, AppError> {
        let payload = self.client.get_order(&order.order_id).await?;
        let detail = payload.pointer("/items/0").unwrap_or(&payload);

        let status = detail
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("pending");

        match status {
            "active" | "completed" | "done" => self.try_finalize(order, detail).await,
            "failed" | "cancelled" | "rejected" => {
                let message = detail
                    .get("statusMessage")
                    .and_then(|m| m.as_str())
                    .unwrap_or("Order failed on the provider side")
                    .to_string();

                let repo = AezaOrderRepository::new(&self.db);
                let order_id = order.order_id.clone();
                let failed = repo.mark_failed(order, message.clone()).await?;

                tracing::error!("Order {} failed: {}", order_id, message);
                self.notify_order(&failed, format!("VPS order {} failed: {}", order_id, message));

                Ok(PollOutcome::Done)
            }
            _ => Ok(PollOutcome::KeepWaiting),
        }
    }

    /// An active order only counts as delivered once its instance is up and
    /// has an address. The order payload names the instance; the instance
    /// detail is fetched separately and the poll keeps waiting until it
    /// carries an IP.
    async fn try_finalize(
        &self,
        order: entity::aeza_order::Model,
        detail: &serde_json::Value,
    ) -> Result<PollOutcome, AppError> {
        let Some(server_id) = extract_string(detail, &["/servers/0/id", "/serviceId", "/id"])
        else {
            tracing::debug!(
                "Order {} is active but names no instance yet",
                order.order_id
            );
            return Ok(PollOutcome::KeepWaiting);
        };

        let service = self.client.get_server(&server_id).await?;
        let instance = service.pointer("/items/0").unwrap_or(&service);

        let Some(ip) = extract_string(instance, &["/ip", "/ipv4", "/ips/0/value"])
            .or_else(|| extract_string(detail, &["/servers/0/ip", "/ip", "/ipv4"]))
        else {
            tracing::debug!("Instance {} has no address yet", server_id);
            return Ok(PollOutcome::KeepWaiting);
        };

        let password = extract_string(
            instance,
            &["/parameters/password", "/secureData/password", "/password"],
        )
        .or_else(|| {
            extract_string(
                detail,
                &["/parameters/password", "/secureData/password", "/password"],
            )
        });

        let repo = AezaOrderRepository::new(&self.db);
        let order_id = order.order_id.clone();
        let ready = repo.mark_ready(order, server_id, ip, password).await?;

        tracing::info!("Order {} delivered", order_id);
        self.notify_order(&ready, format!("VPS order {} is ready.", order_id));

        Ok(PollOutcome::Done)
    }

    fn notify_order(&self, order: &entity::aeza_order::Model, text: String) {
        let chat_id = order
            .meta
            .as_ref()
            .and_then(|meta| meta.pointer("/chat_id"))
            .and_then(|id| id.as_i64());

        if let Some(chat_id) = chat_id {
            self.notifier.send(chat_id, text);
        }
    }
}

/// First of the given JSON pointers that resolves to a non-empty value,
/// stringified. Numbers are accepted because the provider is inconsistent
/// about id types.
fn extract_string(value: &serde_json::Value, pointers: &[&str]) -> Option<String> {
    for pointer in pointers {
        match value.pointer(pointer) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(serde_json::Value::Number(n)) => return Some(n.to_string()),
            _ => {}
        }
    }

    None
}
