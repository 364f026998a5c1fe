//! Business-event counters, bumped by application handlers.

use pulsemeter_core::{Counter, MetricDescriptor, MetricRegistry, Result};

#[derive(Clone)]
pub struct BusinessMetrics {
    signups: Counter,
    logins: Counter,
    login_failures: Counter,
    password_changes: Counter,
    password_failures: Counter,
    profile_updates: Counter,
    admin_users_created: Counter,
    admin_stores_created: Counter,
    ratings_submitted: Counter,
}

impl BusinessMetrics {
    pub fn register(registry: &MetricRegistry) -> Result<Self> {
        let counter = |name: &str, help: &str| registry.register_counter(MetricDescriptor::counter(name, help));
        Ok(Self {
            signups: counter("user_signups_total", "Total number of user signups")?,
            logins: counter("user_logins_total", "Total number of successful logins")?,
            login_failures: counter("user_login_failures_total", "Total number of failed logins")?,
            password_changes: counter(
                "account_password_changes_total",
                "Total number of password changes",
            )?,
            password_failures: counter(
                "account_password_failures_total",
                "Failed password change attempts",
            )?,
            profile_updates: counter(
                "account_profile_updates_total",
                "Total number of profile updates",
            )?,
            admin_users_created: counter(
                "admin_users_created_total",
                "Total number of users created by admins",
            )?,
            admin_stores_created: counter(
                "admin_stores_created_total",
                "Total number of stores created by admins",
            )?,
            ratings_submitted: counter("ratings_submitted_total", "Total number of ratings submitted")?,
        })
    }

    pub fn record_signup(&self) {
        self.signups.inc(&[]);
    }

    pub fn record_login_success(&self) {
        self.logins.inc(&[]);
    }

    pub fn record_login_failure(&self) {
        self.login_failures.inc(&[]);
    }

    /// Successful and failed attempts land on separate counters.
    pub fn record_password_change(&self, success: bool) {
        if success {
            self.password_changes.inc(&[]);
        } else {
            self.password_failures.inc(&[]);
        }
    }

    pub fn record_profile_update(&self) {
        self.profile_updates.inc(&[]);
    }

    pub fn record_admin_user_created(&self) {
        self.admin_users_created.inc(&[]);
    }

    pub fn record_admin_store_created(&self) {
        self.admin_stores_created.inc(&[]);
    }

    /// Labeled per store and user; cardinality grows with both.
    pub fn record_rating_submitted(&self, store_id: &str, user_id: &str) {
        self.ratings_submitted
            .inc(&[("store_id", store_id), ("user_id", user_id)]);
    }
}
