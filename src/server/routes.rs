// HTTP routes configuration
// Author: kelexine (https://github.com/kelexine)

use super::handlers::*;
use super::middleware::{catch_panic_layer, envelope_plain_errors, request_id_layers};
use crate::auth::SessionContext;
use crate::config::AppConfig;
use crate::error::Result;
use crate::gateway::{ProxyGateway, RouteId};
use axum::{
    routing::{get, post, put},
    Router,
};
use axum_extra::extract::CookieJar;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub gateway: ProxyGateway,
}

impl AppState {
    /// Builds the per-request session from the inbound cookies.
    pub fn session(&self, jar: &CookieJar) -> SessionContext {
        SessionContext::from_cookies(jar, &self.config.auth.cookie_name)
    }
}

fn path(route: RouteId) -> &'static str {
    route.spec().inbound_path
}

pub fn create_router(config: AppConfig, gateway: ProxyGateway) -> Result<Router> {
    let body_limit = config.server.body_limit_bytes;
    let state = AppState {
        config: Arc::new(config),
        gateway,
    };

    let (set_request_id, propagate_request_id) = request_id_layers();

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route(path(RouteId::ActiveAds), get(active_ads_handler))
        .route(path(RouteId::Chat), post(chat_handler))
        .route(path(RouteId::Contact), post(contact_handler))
        .route(path(RouteId::UserNotifications), get(user_notifications_handler))
        .route(
            path(RouteId::MarkNotificationRead),
            put(mark_notification_read_handler),
        )
        .route(
            path(RouteId::CreatePaymentOrder),
            post(create_payment_order_handler),
        )
        .route(path(RouteId::PaymentHistory), get(payment_history_handler))
        .route(path(RouteId::InvoiceDownload), get(invoice_download_handler))
        .route(path(RouteId::VerifyPayment), post(verify_payment_handler))
        .route(
            path(RouteId::ActivatePurchasedPlan),
            post(activate_purchased_plan_handler),
        )
        .route(path(RouteId::PurchasedPlans), get(purchased_plans_handler))
        .route(
            path(RouteId::ActiveSubscription),
            get(active_subscription_handler),
        )
        .route(path(RouteId::WebsiteData), get(website_data_handler))
        .fallback(not_found_handler)
        .layer(catch_panic_layer())
        .layer(tower_http::limit::RequestBodyLimitLayer::new(body_limit))
        .layer(axum::middleware::map_response(envelope_plain_errors))
        .layer(TraceLayer::new_for_http())
        .layer(propagate_request_id)
        .layer(set_request_id)
        .with_state(state);

    Ok(app)
}

