// Invalidation graph
// Author: kelexine (https://github.com/kelexine)
//
// One static table says which resources go stale after which mutation. The
// cache consumes it through a single routine, `QueryCache::invalidate_resources`.

use super::key::Resource;

/// Writes that change server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mutation {
    ActivatePurchasedPlan,
    MarkNotificationRead,
    CreatePaymentOrder,
    VerifyPayment,
    SendContact,
    SendChat,
}

/// Events from the push channel. Only their cache effect is handled here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushEvent {
    NotificationReceived,
    SubscriptionChanged,
}

static INVALIDATION_GRAPH: &[(Mutation, &[Resource])] = &[
    (
        Mutation::ActivatePurchasedPlan,
        &[Resource::PurchasedPlans, Resource::ActiveSubscription],
    ),
    (Mutation::MarkNotificationRead, &[Resource::UserNotifications]),
    (Mutation::CreatePaymentOrder, &[Resource::PaymentHistory]),
    (
        Mutation::VerifyPayment,
        &[
            Resource::PaymentHistory,
            Resource::PurchasedPlans,
            Resource::ActiveSubscription,
        ],
    ),
    (Mutation::SendContact, &[]),
    (Mutation::SendChat, &[]),
];

impl Mutation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mutation::ActivatePurchasedPlan => "activatePurchasedPlan",
            Mutation::MarkNotificationRead => "markNotificationRead",
            Mutation::CreatePaymentOrder => "createPaymentOrder",
            Mutation::VerifyPayment => "verifyPayment",
            Mutation::SendContact => "sendContact",
            Mutation::SendChat => "sendChat",
        }
    }

    /// Resources to mark stale once this mutation succeeds.
    pub fn invalidates(&self) -> &'static [Resource] {
        INVALIDATION_GRAPH
            .iter()
            .find(|(mutation, _)| mutation == self)
            .map(|(_, resources)| *resources)
            .unwrap_or(&[])
    }
}

impl PushEvent {
    pub fn invalidates(&self) -> &'static [Resource] {
        match self {
            PushEvent::NotificationReceived => &[Resource::UserNotifications],
            PushEvent::SubscriptionChanged => {
                &[Resource::ActiveSubscription, Resource::PurchasedPlans]
            }
        }
    }
}
