// One operation per logical backend endpoint
// Author: kelexine (https://github.com/kelexine)

use super::forward::{BinaryPayload, Forwarded, ProxyGateway};
use super::route::RouteId;
use super::validation::{
    parse_body, require_identifier, validate_chat, validate_contact, validate_create_order,
    validate_verify_payment,
};
use crate::auth::SessionContext;
use crate::error::{GatewayError, Result};
use crate::models::{ChatRequest, ContactForm, CreateOrderRequest, VerifyPaymentRequest, WebsiteData};
use serde::Serialize;
use serde_json::Value;

type Query = Vec<(String, String)>;

fn to_body<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| GatewayError::Internal(format!("Failed to serialize request body: {}", e)))
}

impl ProxyGateway {
    pub async fn active_ads(&self, session: &SessionContext, query: Query) -> Result<Forwarded<Value>> {
        let request = self
            .request(RouteId::ActiveAds, session)
            .query(query)
            .build();
        self.forward(&request).await
    }

    pub async fn chat(&self, session: &SessionContext, raw_body: &[u8]) -> Result<Forwarded<Value>> {
        let body: ChatRequest = parse_body(raw_body)?;
        validate_chat(&body)?;
        let request = self
            .request(RouteId::Chat, session)
            .body(to_body(&body)?)
            .build();
        self.forward(&request).await
    }

    pub async fn contact(&self, session: &SessionContext, raw_body: &[u8]) -> Result<Forwarded<Value>> {
        let form: ContactForm = parse_body(raw_body)?;
        validate_contact(&form)?;
        let request = self
            .request(RouteId::Contact, session)
            .body(to_body(&form)?)
            .build();
        self.forward(&request).await
    }

    pub async fn user_notifications(
        &self,
        session: &SessionContext,
        query: Query,
    ) -> Result<Forwarded<Value>> {
        let request = self
            .request(RouteId::UserNotifications, session)
            .query(query)
            .build();
        self.forward(&request).await
    }

    pub async fn mark_notification_read(
        &self,
        session: &SessionContext,
        notification_id: &str,
    ) -> Result<Forwarded<Value>> {
        require_identifier("Notification ID", notification_id)?;
        let request = self
            .request(RouteId::MarkNotificationRead, session)
            .id(notification_id)
            .build();
        self.forward(&request).await
    }

    pub async fn create_payment_order(
        &self,
        session: &SessionContext,
        raw_body: &[u8],
    ) -> Result<Forwarded<Value>> {
        let body: CreateOrderRequest = parse_body(raw_body)?;
        validate_create_order(&body)?;
        let request = self
            .request(RouteId::CreatePaymentOrder, session)
            .body(to_body(&body)?)
            .build();
        self.forward(&request).await
    }

    pub async fn payment_history(
        &self,
        session: &SessionContext,
        query: Query,
    ) -> Result<Forwarded<Value>> {
        let request = self
            .request(RouteId::PaymentHistory, session)
            .query(query)
            .build();
        self.forward(&request).await
    }

    pub async fn download_invoice(
        &self,
        session: &SessionContext,
        payment_id: &str,
    ) -> Result<BinaryPayload> {
        require_identifier("Payment ID", payment_id)?;
        let request = self
            .request(RouteId::InvoiceDownload, session)
            .id(payment_id)
            .build();
        self.forward_binary(&request, payment_id).await
    }

    pub async fn verify_payment(
        &self,
        session: &SessionContext,
        raw_body: &[u8],
    ) -> Result<Forwarded<Value>> {
        let body: VerifyPaymentRequest = parse_body(raw_body)?;
        validate_verify_payment(&body)?;
        let request = self
            .request(RouteId::VerifyPayment, session)
            .body(to_body(&body)?)
            .build();
        self.forward(&request).await
    }

    pub async fn activate_purchased_plan(
        &self,
        session: &SessionContext,
        purchased_plan_id: &str,
    ) -> Result<Forwarded<Value>> {
        require_identifier("Purchased plan ID", purchased_plan_id)?;
        let request = self
            .request(RouteId::ActivatePurchasedPlan, session)
            .id(purchased_plan_id)
            .build();
        self.forward(&request).await
    }

    pub async fn purchased_plans(
        &self,
        session: &SessionContext,
        query: Query,
    ) -> Result<Forwarded<Value>> {
        let request = self
            .request(RouteId::PurchasedPlans, session)
            .query(query)
            .build();
        self.forward(&request).await
    }

    pub async fn active_subscription(&self, session: &SessionContext) -> Result<Forwarded<Value>> {
        self.forward(&self.request(RouteId::ActiveSubscription, session).build())
            .await
    }

    /// Ads and plans in one response. Always success-shaped: a failed source
    /// contributes an empty list.
    pub async fn website_data(&self, session: &SessionContext) -> Result<Forwarded<WebsiteData>> {
        let outcomes = self
            .fan_out(&self.request(RouteId::WebsiteData, session).build())
            .await?;

        let mut data = WebsiteData::default();
        for outcome in outcomes {
            match outcome.source {
                "ads" => data.ads = outcome.items,
                "plans" => data.plans = outcome.items,
                _ => {}
            }
        }
        Ok(Forwarded { status: 200, data })
    }
}
