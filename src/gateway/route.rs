// Route metadata table
// Author: kelexine (https://github.com/kelexine)
//
// Read-only after startup. Each logical route knows its method, where it is
// mounted, where it goes on the backend, whether it needs a credential and how
// it is forwarded.

use crate::auth::Access;
use reqwest::Method;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteId {
    ActiveAds,
    Chat,
    Contact,
    UserNotifications,
    MarkNotificationRead,
    CreatePaymentOrder,
    PaymentHistory,
    InvoiceDownload,
    VerifyPayment,
    ActivatePurchasedPlan,
    PurchasedPlans,
    ActiveSubscription,
    WebsiteData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardMode {
    Single,
    Binary,
    FanOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    Json,
    Binary,
}

/// One constituent call of a fan-out route.
#[derive(Debug)]
pub struct FanOutSource {
    pub name: &'static str,
    pub backend_path: &'static str,
}

#[derive(Debug)]
pub struct RouteSpec {
    pub id: RouteId,
    /// Metrics and log label.
    pub name: &'static str,
    pub method: Method,
    /// Path the browser calls; `:id` marks the path parameter.
    pub inbound_path: &'static str,
    /// Backend path template; `:id` is substituted at request time.
    pub backend_path: &'static str,
    pub access: Access,
    pub mode: ForwardMode,
    /// Constituent calls, only for [`ForwardMode::FanOut`].
    pub sources: &'static [FanOutSource],
}

impl RouteSpec {
    pub fn auth_required(&self) -> bool {
        self.access == Access::CredentialRequired
    }

    pub fn response_kind(&self) -> ResponseKind {
        match self.mode {
            ForwardMode::Binary => ResponseKind::Binary,
            ForwardMode::Single | ForwardMode::FanOut => ResponseKind::Json,
        }
    }

    pub fn fan_out(&self) -> bool {
        self.mode == ForwardMode::FanOut
    }

    /// Read-mostly JSON routes must not be cached by HTTP intermediaries.
    pub fn no_store(&self) -> bool {
        self.method == Method::GET && self.response_kind() == ResponseKind::Json
    }

    /// Substitutes the `:id` segment with the percent-encoded identifier.
    pub fn backend_path_for(&self, id: Option<&str>) -> String {
        fill_id(self.backend_path, id)
    }

    /// Same as [`RouteSpec::backend_path_for`], for callers of the gateway itself.
    pub fn inbound_path_for(&self, id: Option<&str>) -> String {
        fill_id(self.inbound_path, id)
    }
}

fn fill_id(template: &str, id: Option<&str>) -> String {
    match id {
        Some(id) => template.replace(":id", &urlencoding::encode(id)),
        None => template.to_string(),
    }
}

static ROUTES: [RouteSpec; 13] = [
    RouteSpec {
        id: RouteId::ActiveAds,
        name: "active_ads",
        method: Method::GET,
        inbound_path: "/api/ads/active",
        backend_path: "/ads/active",
        access: Access::Public,
        mode: ForwardMode::Single,
        sources: &[],
    },
    RouteSpec {
        id: RouteId::Chat,
        name: "chat",
        method: Method::POST,
        inbound_path: "/api/chat",
        backend_path: "/chat",
        access: Access::Public,
        mode: ForwardMode::Single,
        sources: &[],
    },
    RouteSpec {
        id: RouteId::Contact,
        name: "contact",
        method: Method::POST,
        inbound_path: "/api/contact",
        backend_path: "/contact",
        access: Access::Public,
        mode: ForwardMode::Single,
        sources: &[],
    },
    RouteSpec {
        id: RouteId::UserNotifications,
        name: "user_notifications",
        method: Method::GET,
        inbound_path: "/api/notifications",
        backend_path: "/notifications/user",
        access: Access::CredentialRequired,
        mode: ForwardMode::Single,
        sources: &[],
    },
    RouteSpec {
        id: RouteId::MarkNotificationRead,
        name: "mark_notification_read",
        method: Method::PUT,
        inbound_path: "/api/notifications/:id/read",
        backend_path: "/notifications/:id/read",
        access: Access::CredentialRequired,
        mode: ForwardMode::Single,
        sources: &[],
    },
    RouteSpec {
        id: RouteId::CreatePaymentOrder,
        name: "create_payment_order",
        method: Method::POST,
        inbound_path: "/api/payments/order",
        backend_path: "/payments/create-order",
        access: Access::CredentialRequired,
        mode: ForwardMode::Single,
        sources: &[],
    },
    RouteSpec {
        id: RouteId::PaymentHistory,
        name: "payment_history",
        method: Method::GET,
        inbound_path: "/api/payments/history",
        backend_path: "/payments/history",
        access: Access::CredentialRequired,
        mode: ForwardMode::Single,
        sources: &[],
    },
    RouteSpec {
        id: RouteId::InvoiceDownload,
        name: "invoice_download",
        method: Method::GET,
        inbound_path: "/api/payments/:id/invoice",
        backend_path: "/payments/:id/invoice",
        access: Access::CredentialRequired,
        mode: ForwardMode::Binary,
        sources: &[],
    },
    RouteSpec {
        id: RouteId::VerifyPayment,
        name: "verify_payment",
        method: Method::POST,
        inbound_path: "/api/payments/verify",
        backend_path: "/payments/verify",
        access: Access::CredentialRequired,
        mode: ForwardMode::Single,
        sources: &[],
    },
    RouteSpec {
        id: RouteId::ActivatePurchasedPlan,
        name: "activate_purchased_plan",
        method: Method::POST,
        inbound_path: "/api/purchased-plans/:id/activate",
        backend_path: "/purchased-plans/:id/activate",
        access: Access::CredentialRequired,
        mode: ForwardMode::Single,
        sources: &[],
    },
    RouteSpec {
        id: RouteId::PurchasedPlans,
        name: "purchased_plans",
        method: Method::GET,
        inbound_path: "/api/purchased-plans",
        backend_path: "/purchased-plans",
        access: Access::CredentialRequired,
        mode: ForwardMode::Single,
        sources: &[],
    },
    RouteSpec {
        id: RouteId::ActiveSubscription,
        name: "active_subscription",
        method: Method::GET,
        inbound_path: "/api/subscriptions/active",
        backend_path: "/subscriptions/active",
        access: Access::CredentialRequired,
        mode: ForwardMode::Single,
        sources: &[],
    },
    RouteSpec {
        id: RouteId::WebsiteData,
        name: "website_data",
        method: Method::GET,
        inbound_path: "/api/website-data",
        backend_path: "/ads/active",
        access: Access::Public,
        mode: ForwardMode::FanOut,
        sources: &[
            FanOutSource {
                name: "ads",
                backend_path: "/ads/active",
            },
            FanOutSource {
                name: "plans",
                backend_path: "/plans",
            },
        ],
    },
];

impl RouteId {
    pub fn spec(self) -> &'static RouteSpec {
        // Table order matches declaration order of the enum.
        &ROUTES[self as usize]
    }

    /// Looks a route up by its configuration name (`website_data`).
    pub fn from_name(name: &str) -> Option<RouteId> {
        ROUTES.iter().find(|spec| spec.name == name).map(|spec| spec.id)
    }
}

/// The whole table, in declaration order.
pub fn routes() -> &'static [RouteSpec] {
    &ROUTES
}
