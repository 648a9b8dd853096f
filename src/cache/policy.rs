//! Freshness and eviction policies per resource kind.
//!
//! | resource | staleTime | gcTime | refetch on focus | background refresh |
//! |---|---|---|---|---|
//! | activeSubscription | 5 min | 10 min | no | yes |
//! | userNotifications, purchasedPlans | 30 s | 5 min | yes | no |
//! | paymentHistory | 1 min | 10 min | no | no |
//! | activeAds, websiteData | 5 min | 10 min | no | yes |
//!
//! With background refresh a stale entry is served at once while a refetch
//! runs; without it the reader waits for the refetch. Evicted and invalidated
//! entries always wait.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use super::key::Resource;
use crate::auth::Access;
use crate::config::CacheConfig;
use std::collections::HashMap;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryPolicy {
    pub stale_time: Duration,
    pub gc_time: Duration,
    pub refetch_on_focus: bool,
    pub background_refresh: bool,
    /// Reads are skipped entirely when the Auth Gate would reject the session.
    pub access: Access,
}

const SECOND: Duration = Duration::from_secs(1);
const MINUTE: Duration = Duration::from_secs(60);

impl QueryPolicy {
    pub fn for_resource(resource: Resource) -> Self {
        match resource {
            Resource::ActiveSubscription => Self {
                stale_time: 5 * MINUTE,
                gc_time: 10 * MINUTE,
                refetch_on_focus: false,
                background_refresh: true,
                access: Access::CredentialRequired,
            },
            Resource::UserNotifications | Resource::PurchasedPlans => Self {
                stale_time: 30 * SECOND,
                gc_time: 5 * MINUTE,
                refetch_on_focus: true,
                background_refresh: false,
                access: Access::CredentialRequired,
            },
            Resource::PaymentHistory => Self {
                stale_time: MINUTE,
                gc_time: 10 * MINUTE,
                refetch_on_focus: false,
                background_refresh: false,
                access: Access::CredentialRequired,
            },
            Resource::ActiveAds | Resource::WebsiteData => Self {
                stale_time: 5 * MINUTE,
                gc_time: 10 * MINUTE,
                refetch_on_focus: false,
                background_refresh: true,
                access: Access::Public,
            },
        }
    }
}

/// Policies for every resource, defaults overlaid with configuration.
#[derive(Debug, Clone)]
pub struct PolicyTable {
    policies: HashMap<Resource, QueryPolicy>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        Self {
            policies: Resource::ALL
                .iter()
                .map(|r| (*r, QueryPolicy::for_resource(*r)))
                .collect(),
        }
    }
}

impl PolicyTable {
    pub fn from_config(config: &CacheConfig) -> Self {
        let mut table = Self::default();
        for (resource, overrides) in &config.policies {
            let policy = table
                .policies
                .entry(*resource)
                .or_insert_with(|| QueryPolicy::for_resource(*resource));
            if let Some(secs) = overrides.stale_time_seconds {
                policy.stale_time = Duration::from_secs(secs);
            }
            if let Some(secs) = overrides.gc_time_seconds {
                policy.gc_time = Duration::from_secs(secs);
            }
            if let Some(flag) = overrides.refetch_on_focus {
                policy.refetch_on_focus = flag;
            }
            if let Some(flag) = overrides.background_refresh {
                policy.background_refresh = flag;
            }
            if policy.gc_time < policy.stale_time {
                warn!(
                    "gc_time of {} is shorter than its stale_time; raising it to match",
                    resource
                );
                policy.gc_time = policy.stale_time;
            }
        }
        table
    }

    pub fn get(&self, resource: Resource) -> QueryPolicy {
        self.policies
            .get(&resource)
            .cloned()
            .unwrap_or_else(|| QueryPolicy::for_resource(resource))
    }
}
