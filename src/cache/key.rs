// Query keys
// Author: kelexine (https://github.com/kelexine)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Logical resource a query reads. Invalidation works at this granularity.
///
/// The lowercase aliases accept keys coming through environment variables,
/// which lose their case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resource {
    #[serde(alias = "activeads")]
    ActiveAds,
    #[serde(alias = "websitedata")]
    WebsiteData,
    #[serde(alias = "usernotifications")]
    UserNotifications,
    #[serde(alias = "paymenthistory")]
    PaymentHistory,
    #[serde(alias = "purchasedplans")]
    PurchasedPlans,
    #[serde(alias = "activesubscription")]
    ActiveSubscription,
}

impl Resource {
    pub const ALL: [Resource; 6] = [
        Resource::ActiveAds,
        Resource::WebsiteData,
        Resource::UserNotifications,
        Resource::PaymentHistory,
        Resource::PurchasedPlans,
        Resource::ActiveSubscription,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::ActiveAds => "activeAds",
            Resource::WebsiteData => "websiteData",
            Resource::UserNotifications => "userNotifications",
            Resource::PaymentHistory => "paymentHistory",
            Resource::PurchasedPlans => "purchasedPlans",
            Resource::ActiveSubscription => "activeSubscription",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(resource, params)`, e.g. `("userNotifications", {page: 1})`.
///
/// Parameters are kept sorted so two keys built in a different order are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey {
    pub resource: Resource,
    pub params: BTreeMap<String, String>,
}

impl QueryKey {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Parameters as a query string list, for fetchers that forward them.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl From<Resource> for QueryKey {
    fn from(resource: Resource) -> Self {
        QueryKey::new(resource)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.resource)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, "{{{}}}", params.join(","))?;
        }
        Ok(())
    }
}
