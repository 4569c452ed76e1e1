use crate::errors::AppError;
use crate::models::Subscription;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Thread-safe registry of subscribed customers and their active loans.
///
/// All check-and-set operations run under the write lock, so two concurrent
/// `begin_loan` calls for the same customer can never both succeed.
#[derive(Default, Clone)]
pub struct SubscriptionRegistry {
    subscriptions: Arc<RwLock<HashMap<String, Subscription>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a customer, failing with `AlreadySubscribed` on a duplicate.
    pub async fn subscribe(&self, customer_number: &str) -> Result<Uuid, AppError> {
        let mut subscriptions = self.subscriptions.write().await;
        if subscriptions.contains_key(customer_number) {
            return Err(AppError::AlreadySubscribed(customer_number.to_string()));
        }

        let subscription = Subscription {
            customer_number: customer_number.to_string(),
            subscription_id: Uuid::new_v4(),
            created_at: Utc::now(),
            active_loan_id: None,
        };
        let subscription_id = subscription.subscription_id;
        subscriptions.insert(customer_number.to_string(), subscription);

        tracing::info!(
            "Subscribed customer {} ({})",
            customer_number,
            subscription_id
        );
        Ok(subscription_id)
    }

    /// Claims the customer's single active-loan slot for `application_id`.
    pub async fn begin_loan(
        &self,
        customer_number: &str,
        application_id: Uuid,
    ) -> Result<(), AppError> {
        let mut subscriptions = self.subscriptions.write().await;
        let subscription = subscriptions
            .get_mut(customer_number)
            .ok_or_else(|| AppError::NotSubscribed(customer_number.to_string()))?;

        if let Some(active) = subscription.active_loan_id {
            tracing::debug!(
                "Customer {} already has active loan {}",
                customer_number,
                active
            );
            return Err(AppError::LoanAlreadyActive(customer_number.to_string()));
        }

        subscription.active_loan_id = Some(application_id);
        Ok(())
    }

    /// Releases the customer's active loan if it is still `application_id`.
    ///
    /// Idempotent. Returns `true` only for the call that actually cleared the
    /// slot; a release for an older application never clears a newer one.
    pub async fn end_loan(&self, customer_number: &str, application_id: Uuid) -> bool {
        let mut subscriptions = self.subscriptions.write().await;
        match subscriptions.get_mut(customer_number) {
            Some(subscription) if subscription.active_loan_id == Some(application_id) => {
                subscription.active_loan_id = None;
                true
            }
            _ => false,
        }
    }

    pub async fn get(&self, customer_number: &str) -> Option<Subscription> {
        let subscriptions = self.subscriptions.read().await;
        subscriptions.get(customer_number).cloned()
    }

    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.subscriptions.read().await.is_empty()
    }
}
