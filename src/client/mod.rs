//! Typed client for the gateway that reads through the query cache.
//!
//! [`SiteClient`] is what the browser-side data hooks become in a Rust
//! process: each read is keyed, deduplicated and served from the cache while
//! fresh; each write goes through [`QueryCache::mutate`] so the resources it
//! affects are marked stale once it succeeds.
//!
//! Author: kelexine (<https://github.com/kelexine>)

mod transport;

pub use transport::GatewayTransport;

use crate::auth::SessionContext;
use crate::cache::{Mutation, PolicyTable, PushEvent, QueryCache, QueryKey, Resource};
use crate::config::AppConfig;
use crate::error::Result;
use crate::gateway::RouteId;
use crate::models::ContactForm;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// One signed-in (or anonymous) client session.
///
/// Reads return `Ok(None)` without any network traffic when the resource
/// needs a credential the session does not carry.
#[derive(Clone)]
pub struct SiteClient {
    transport: GatewayTransport,
    session: SessionContext,
    cache: QueryCache<Value, crate::error::GatewayError>,
    policies: Arc<PolicyTable>,
}

impl SiteClient {
    pub fn new(base_url: &str, session: SessionContext) -> Result<Self> {
        let transport = GatewayTransport::new(
            base_url,
            crate::auth::DEFAULT_COOKIE_NAME,
            DEFAULT_TIMEOUT,
        )?;
        Ok(Self::with_transport(transport, session))
    }

    /// Uses the configured cookie name, backend timeout and cache policy
    /// overrides. `base_url` is where the gateway itself listens.
    pub fn from_config(config: &AppConfig, base_url: &str, session: SessionContext) -> Result<Self> {
        let transport = GatewayTransport::new(
            base_url,
            &config.auth.cookie_name,
            Duration::from_secs(config.backend.timeout_seconds),
        )?;
        Ok(Self::with_transport(transport, session)
            .with_policies(PolicyTable::from_config(&config.cache)))
    }

    pub fn with_transport(transport: GatewayTransport, session: SessionContext) -> Self {
        Self {
            transport,
            session,
            cache: QueryCache::new(),
            policies: Arc::new(PolicyTable::default()),
        }
    }

    pub fn with_policies(mut self, policies: PolicyTable) -> Self {
        self.policies = Arc::new(policies);
        self
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn cache(&self) -> &QueryCache<Value, crate::error::GatewayError> {
        &self.cache
    }

    async fn query(&self, key: QueryKey, route: RouteId) -> Result<Option<Value>> {
        let policy = self.policies.get(key.resource);
        let transport = self.transport.clone();
        let session = self.session.clone();
        let params = key.query_pairs();

        self.cache
            .get(key, &policy, &self.session, move || {
                let transport = transport.clone();
                let session = session.clone();
                let params = params.clone();
                async move { transport.call(route, None, &params, None, &session).await }
            })
            .await
    }

    async fn send(
        &self,
        mutation: Mutation,
        route: RouteId,
        id: Option<&str>,
        body: Option<Value>,
    ) -> Result<Value> {
        let call = self
            .transport
            .call(route, id, &[], body.as_ref(), &self.session);
        self.cache.mutate(mutation, call).await
    }

    // ---- reads -------------------------------------------------------------

    pub async fn notifications(&self, page: u32, limit: u32) -> Result<Option<Value>> {
        let key = QueryKey::new(Resource::UserNotifications)
            .with_param("page", page)
            .with_param("limit", limit);
        self.query(key, RouteId::UserNotifications).await
    }

    pub async fn purchased_plans(&self) -> Result<Option<Value>> {
        self.query(Resource::PurchasedPlans.into(), RouteId::PurchasedPlans)
            .await
    }

    pub async fn active_subscription(&self) -> Result<Option<Value>> {
        self.query(
            Resource::ActiveSubscription.into(),
            RouteId::ActiveSubscription,
        )
        .await
    }

    pub async fn payment_history(&self, page: u32) -> Result<Option<Value>> {
        let key = QueryKey::new(Resource::PaymentHistory).with_param("page", page);
        self.query(key, RouteId::PaymentHistory).await
    }

    pub async fn active_ads(&self) -> Result<Option<Value>> {
        self.query(Resource::ActiveAds.into(), RouteId::ActiveAds)
            .await
    }

    pub async fn website_data(&self) -> Result<Option<Value>> {
        self.query(Resource::WebsiteData.into(), RouteId::WebsiteData)
            .await
    }

    // ---- writes ------------------------------------------------------------

    pub async fn activate_plan(&self, purchased_plan_id: &str) -> Result<Value> {
        self.send(
            Mutation::ActivatePurchasedPlan,
            RouteId::ActivatePurchasedPlan,
            Some(purchased_plan_id),
            None,
        )
        .await
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<Value> {
        self.send(
            Mutation::MarkNotificationRead,
            RouteId::MarkNotificationRead,
            Some(notification_id),
            None,
        )
        .await
    }

    pub async fn create_order(&self, plan_id: &str) -> Result<Value> {
        self.send(
            Mutation::CreatePaymentOrder,
            RouteId::CreatePaymentOrder,
            None,
            Some(json!({ "planId": plan_id })),
        )
        .await
    }

    pub async fn verify_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Value> {
        let body = json!({
            "orderId": order_id,
            "paymentId": payment_id,
            "signature": signature,
        });
        self.send(
            Mutation::VerifyPayment,
            RouteId::VerifyPayment,
            None,
            Some(body),
        )
        .await
    }

    pub async fn send_contact(&self, form: &ContactForm) -> Result<Value> {
        let body = serde_json::to_value(form).map_err(|e| {
            crate::error::GatewayError::Internal(format!("Failed to serialize contact form: {}", e))
        })?;
        self.send(Mutation::SendContact, RouteId::Contact, None, Some(body))
            .await
    }

    pub async fn chat(&self, message: &str) -> Result<Value> {
        self.send(
            Mutation::SendChat,
            RouteId::Chat,
            None,
            Some(json!({ "message": message })),
        )
        .await
    }

    // ---- lifecycle hooks ---------------------------------------------------

    /// The window regained focus. Returns how many refreshes were started.
    pub fn focus(&self) -> usize {
        self.cache.on_focus()
    }

    /// A push notification arrived. Returns how many entries were marked stale.
    pub fn handle_push(&self, event: &PushEvent) -> usize {
        self.cache.handle_push(event)
    }
}
