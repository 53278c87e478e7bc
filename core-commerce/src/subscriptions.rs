//! Subscription Client
//!
//! Typed wrapper for plan listings and the current user's subscriptions.
//! Subscription changes announce themselves on the core event bus.

use crate::catalog::decode;
use crate::error::Result;
use crate::types::{Plan, Subscription};
use bridge_traits::HttpMethod;
use core_runtime::events::{CommerceEvent, CoreEvent, EventBus};
use core_session::RequestPipeline;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubscribeRequest {
    plan_id: Uuid,
}

/// Typed client for the plan and subscription endpoints.
pub struct SubscriptionClient {
    pipeline: Arc<RequestPipeline>,
    bus: EventBus,
}

impl SubscriptionClient {
    pub fn new(pipeline: Arc<RequestPipeline>, bus: EventBus) -> Self {
        Self { pipeline, bus }
    }

    /// List all plans, active or not.
    #[instrument(skip(self))]
    pub async fn list_plans(&self) -> Result<Vec<Plan>> {
        let response = self.pipeline.send(HttpMethod::Get, "/plans", None).await?;
        decode(&response)
    }

    /// List only the plans currently open for subscription.
    #[instrument(skip(self))]
    pub async fn active_plans(&self) -> Result<Vec<Plan>> {
        let response = self
            .pipeline
            .send(HttpMethod::Get, "/plans/active", None)
            .await?;
        decode(&response)
    }

    /// The current user's subscriptions, past and present.
    #[instrument(skip(self))]
    pub async fn my_subscriptions(&self) -> Result<Vec<Subscription>> {
        let response = self
            .pipeline
            .send(HttpMethod::Get, "/subscriptions/mine", None)
            .await?;
        decode(&response)
    }

    /// Subscribe the current user to a plan.
    #[instrument(skip(self))]
    pub async fn subscribe(&self, plan_id: Uuid) -> Result<Subscription> {
        let response = self
            .pipeline
            .send_json(
                HttpMethod::Post,
                "/subscriptions",
                &SubscribeRequest { plan_id },
            )
            .await?;
        let subscription: Subscription = decode(&response)?;

        info!(subscription_id = %subscription.id, plan_id = %plan_id, "Subscription started");
        self.bus
            .emit(CoreEvent::Commerce(CommerceEvent::SubscriptionStarted {
                subscription_id: subscription.id.to_string(),
                plan_id: plan_id.to_string(),
            }))
            .ok();

        Ok(subscription)
    }

    /// Cancel a subscription.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> Result<Subscription> {
        let path = format!("/subscriptions/{}/cancel", id);
        let response = self.pipeline.send(HttpMethod::Post, &path, None).await?;
        let subscription: Subscription = decode(&response)?;

        info!(subscription_id = %id, "Subscription cancelled");
        self.bus
            .emit(CoreEvent::Commerce(CommerceEvent::SubscriptionCancelled {
                subscription_id: id.to_string(),
            }))
            .ok();

        Ok(subscription)
    }
}
