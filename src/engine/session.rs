use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::engine::distance::ResolvedDistance;
use crate::engine::tracking::TrackingId;
use crate::error::OrderError;
use crate::models::order::{CustomerRef, OrderDraft, StoreAffiliation};
use crate::models::settings::PricingSettings;
use crate::store::pending::HoldPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Draft,
    Quoted,
    PendingHold,
    Committed,
    Abandoned,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub distance: ResolvedDistance,
    pub price: u64,
    pub settings: PricingSettings,
    pub quoted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingHold {
    pub tracking_id: TrackingId,
    pub path: HoldPath,
}

/// One customer's in-progress order, carried between the quote, hold and payment steps.
#[derive(Debug, Clone, Serialize)]
pub struct OrderSession {
    pub id: Uuid,
    pub customer: CustomerRef,
    pub store: Option<StoreAffiliation>,
    state: OrderState,
    draft: Option<OrderDraft>,
    quote: Option<Quote>,
    hold: Option<PendingHold>,
    pub started_at: DateTime<Utc>,
    touched_at: DateTime<Utc>,
}

impl OrderSession {
    pub fn new(customer: CustomerRef, store: Option<StoreAffiliation>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            customer,
            store,
            state: OrderState::Draft,
            draft: None,
            quote: None,
            hold: None,
            started_at: now,
            touched_at: now,
        }
    }

    pub fn anonymous() -> Self {
        Self::new(CustomerRef::default(), None)
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub fn draft(&self) -> Option<&OrderDraft> {
        self.draft.as_ref()
    }

    pub fn quote(&self) -> Option<&Quote> {
        self.quote.as_ref()
    }

    pub fn hold(&self) -> Option<&PendingHold> {
        self.hold.as_ref()
    }

    /// Last time a transition was recorded.
    pub fn touched_at(&self) -> DateTime<Utc> {
        self.touched_at
    }

    pub fn tracking_id(&self) -> Option<&TrackingId> {
        self.hold.as_ref().map(|hold| &hold.tracking_id)
    }

    pub(crate) fn ensure(
        &self,
        allowed: &[OrderState],
        action: &'static str,
    ) -> Result<(), OrderError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(OrderError::InvalidTransition {
                state: self.state,
                action,
            })
        }
    }

    pub(crate) fn record_quote(&mut self, draft: OrderDraft, quote: Quote) {
        self.draft = Some(draft);
        self.quote = Some(quote);
        self.state = OrderState::Quoted;
        self.touch();
    }

    pub(crate) fn record_hold(&mut self, hold: PendingHold) {
        self.hold = Some(hold);
        self.state = OrderState::PendingHold;
        self.touch();
    }

    pub(crate) fn record_commit(&mut self) {
        self.state = OrderState::Committed;
        self.touch();
    }

    pub(crate) fn abandon(&mut self) -> Result<(), OrderError> {
        self.ensure(&[OrderState::Quoted, OrderState::PendingHold], "abandon")?;
        self.state = OrderState::Abandoned;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.touched_at = Utc::now();
    }
}
