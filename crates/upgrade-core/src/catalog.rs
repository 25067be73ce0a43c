//! Plan Catalog
//!
//! Immutable registry of purchasable plans. Built once at startup and
//! shared read-only by every session.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{CheckoutError, Result};

/// A purchasable tier
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier (e.g. `premium_monthly`)
    pub id: String,

    /// Display name
    pub name: String,

    /// Price in the smallest currency unit; zero is the free tier
    pub price_minor_units: u64,

    /// Ordered feature bullets
    pub features: Vec<String>,

    /// Display flag: "most popular" badge
    #[serde(default)]
    pub popular: bool,

    /// Display flag: accented card
    #[serde(default)]
    pub highlight: bool,
}

impl Plan {
    pub fn new(id: impl Into<String>, name: impl Into<String>, price_minor_units: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price_minor_units,
            features: Vec::new(),
            popular: false,
            highlight: false,
        }
    }

    #[must_use]
    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn popular(mut self) -> Self {
        self.popular = true;
        self
    }

    #[must_use]
    pub fn highlighted(mut self) -> Self {
        self.highlight = true;
        self
    }

    pub const fn is_free(&self) -> bool {
        self.price_minor_units == 0
    }

    /// One-line pitch shown under the price
    pub const fn tagline(&self) -> &'static str {
        if self.is_free() {
            "Essential job search features"
        } else if self.popular {
            "Best for serious job seekers"
        } else {
            "Complete career package"
        }
    }

    /// Button label for the plan card
    pub const fn call_to_action(&self) -> &'static str {
        if self.is_free() {
            "Current Plan"
        } else if self.highlight {
            "Go Pro"
        } else {
            "Upgrade Now"
        }
    }
}

/// Read-only plan registry
#[derive(Clone, Debug)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    /// Build a catalog, rejecting duplicate ids and more than one free tier
    pub fn new(plans: Vec<Plan>) -> Result<Self> {
        if plans.is_empty() {
            return Err(CheckoutError::Catalog("catalog has no plans".into()));
        }

        let mut seen = HashSet::new();
        for plan in &plans {
            if !seen.insert(plan.id.as_str()) {
                return Err(CheckoutError::Catalog(format!("duplicate plan id '{}'", plan.id)));
            }
        }

        let free = plans.iter().filter(|p| p.is_free()).count();
        if free > 1 {
            return Err(CheckoutError::Catalog(format!(
                "{free} plans are priced at zero; only the free tier may be"
            )));
        }

        Ok(Self { plans })
    }

    /// The JobGenie Basic / Premium / Pro lineup
    pub fn jobgenie() -> Self {
        Self {
            plans: vec![
                Plan::new("basic", "Basic", 0).with_features([
                    "5 Applications/month",
                    "Basic Job Listings",
                    "Application Tracker",
                ]),
                Plan::new("premium_monthly", "Premium", 999)
                    .with_features([
                        "Unlimited Applications",
                        "Premium Job Listings",
                        "Priority Applications",
                        "Resume Review",
                    ])
                    .popular(),
                Plan::new("pro_monthly", "Pro", 1999)
                    .with_features([
                        "All Premium Features",
                        "1-on-1 Career Coaching",
                        "Interview Preparation",
                        "LinkedIn Profile Makeover",
                    ])
                    .highlighted(),
            ],
        }
    }

    /// Plans in display order
    pub fn list_plans(&self) -> &[Plan] {
        &self.plans
    }

    /// Look up a plan by id
    pub fn get_plan(&self, id: &str) -> Result<&Plan> {
        self.plans
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| CheckoutError::PlanNotFound(id.to_string()))
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::jobgenie()
    }
}
