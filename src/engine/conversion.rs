use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::engine::distance::{resolve_with_fallback, DistanceRequest, DistanceResolver};
use crate::engine::pricing;
use crate::engine::session::{OrderSession, OrderState, PendingHold, Quote};
use crate::engine::tracking::{self, TrackingId};
use crate::error::{OrderError, ValidationError};
use crate::models::order::{CustomerRef, DeliverySpeed, OrderDraft, PaymentMethod};
use crate::models::package::PackageRecord;
use crate::models::pending::PendingOrder;
use crate::models::settings::PricingSettings;
use crate::observability::metrics::Metrics;
use crate::store::pending::{HoldPath, PendingOrderStore};
use crate::store::schema::{self, Capabilities, WritePath, PACKAGES};
use crate::store::{SettingsSource, StoreError, Table};

/// What a tracking id currently refers to. A committed package wins over a stale hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "order", rename_all = "snake_case")]
pub enum TrackedOrder {
    Package(PackageRecord),
    Pending(PendingOrder),
}

/// Collaborators the service is built from.
pub struct Collaborators {
    pub resolver: Arc<dyn DistanceResolver>,
    pub settings: Arc<dyn SettingsSource>,
    pub pending_orders: Arc<dyn Table>,
    pub packages: Arc<dyn Table>,
}

/// Turns drafts into quotes, quotes into pending holds, and holds into committed packages.
/// It is the only writer of pending orders and package records.
pub struct OrderConversionService {
    config: EngineConfig,
    resolver: Arc<dyn DistanceResolver>,
    settings: Arc<dyn SettingsSource>,
    pending: PendingOrderStore,
    packages: Arc<dyn Table>,
    package_caps: Capabilities,
    metrics: Metrics,
}

impl OrderConversionService {
    /// Builds the service, negotiating optional columns of both tables once.
    pub async fn connect(
        config: EngineConfig,
        collaborators: Collaborators,
        metrics: Metrics,
    ) -> Self {
        let pending =
            PendingOrderStore::connect(collaborators.pending_orders, config.local_hold_ttl).await;
        let package_caps = schema::negotiate(collaborators.packages.as_ref(), &PACKAGES).await;

        Self {
            config,
            resolver: collaborators.resolver,
            settings: collaborators.settings,
            pending,
            packages: collaborators.packages,
            package_caps,
            metrics,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reads pricing settings, falling back to defaults when the source is unreachable.
    pub async fn pricing_settings(&self) -> PricingSettings {
        match self.settings.fetch().await {
            Ok(entries) => PricingSettings::from_entries(entries),
            Err(err) => {
                warn!(error = %err, "pricing settings unavailable; using defaults");
                PricingSettings::default()
            }
        }
    }

    /// Draft -> Quoted. Re-quoting a quoted session replaces the previous quote.
    pub async fn quote(
        &self,
        session: &mut OrderSession,
        draft: OrderDraft,
    ) -> Result<Quote, OrderError> {
        session.ensure(&[OrderState::Draft, OrderState::Quoted], "quote")?;

        if let Err(err) = validate(&draft, &session.customer) {
            self.metrics.quotes_total.with_label_values(&["invalid"]).inc();
            debug!(session_id = %session.id, error = %err, "draft rejected");
            return Err(err.into());
        }

        let start = Instant::now();
        let settings = self.pricing_settings().await;
        let distance = resolve_with_fallback(
            self.resolver.as_ref(),
            &DistanceRequest::for_draft(&draft),
            self.config.distance_timeout,
            self.config.fallback_distance_km,
        )
        .await;

        if let Some(advisory) = &distance.advisory {
            self.metrics
                .distance_fallbacks_total
                .with_label_values(&[advisory.code()])
                .inc();
        }

        let price = pricing::price(
            draft.package_type,
            draft.weight.as_deref(),
            draft.delivery_speed,
            distance.rounded_km,
            &settings,
        );

        let quote = Quote {
            distance,
            price,
            settings,
            quoted_at: Utc::now(),
        };

        self.metrics
            .quote_latency_seconds
            .observe(start.elapsed().as_secs_f64());
        self.metrics.quotes_total.with_label_values(&["quoted"]).inc();
        info!(
            session_id = %session.id,
            distance_km = quote.distance.rounded_km,
            price,
            fallback = quote.distance.is_fallback(),
            "order quoted"
        );

        session.record_quote(draft, quote.clone());
        Ok(quote)
    }

    /// Quoted -> PendingHold. Key conflicts regenerate the random suffix of the tracking id,
    /// up to the configured number of attempts.
    pub async fn hold(&self, session: &mut OrderSession) -> Result<PendingHold, OrderError> {
        session.ensure(&[OrderState::Quoted], "hold")?;
        let (Some(draft), Some(quote)) = (session.draft(), session.quote()) else {
            return Err(OrderError::InvalidTransition {
                state: session.state(),
                action: "hold",
            });
        };

        let max_attempts = self.config.tracking_id_max_attempts.max(1);
        let mut tracking_id =
            tracking::generate(&draft.sender.address, Utc::now(), &mut rand::thread_rng());

        for attempt in 1..=max_attempts {
            let snapshot = pending_snapshot(session, draft, quote, tracking_id.clone());

            // Committed packages no longer have a pending row, so their ids are checked separately.
            let outcome = match self.packages.get(tracking_id.as_str()).await {
                Ok(Some(_)) => Err(StoreError::DuplicateKey(tracking_id.to_string())),
                Ok(None) => self.pending.create(&snapshot).await,
                Err(err) => Err(err),
            };

            match outcome {
                Ok(path) => {
                    self.metrics
                        .holds_total
                        .with_label_values(&[path.as_str()])
                        .inc();
                    if path == HoldPath::Stripped {
                        self.metrics
                            .schema_retries_total
                            .with_label_values(&[schema::PENDING_ORDERS.name])
                            .inc();
                    }
                    info!(
                        session_id = %session.id,
                        tracking_id = %tracking_id,
                        path = path.as_str(),
                        price = snapshot.price,
                        "pending order held"
                    );

                    let hold = PendingHold { tracking_id, path };
                    session.record_hold(hold.clone());
                    return Ok(hold);
                }
                Err(StoreError::DuplicateKey(_)) => {
                    self.metrics.tracking_id_collisions_total.inc();
                    warn!(
                        tracking_id = %tracking_id,
                        attempt,
                        "tracking id already taken; regenerating suffix"
                    );
                    tracking_id = tracking_id.regenerate_suffix(&mut rand::thread_rng());
                }
                Err(err) => {
                    self.metrics.holds_total.with_label_values(&["failed"]).inc();
                    error!(session_id = %session.id, error = %err, "pending order not stored");
                    return Err(err.into());
                }
            }
        }

        self.metrics.holds_total.with_label_values(&["failed"]).inc();
        error!(session_id = %session.id, attempts = max_attempts, "tracking ids exhausted");
        Err(OrderError::TrackingIdExhausted {
            attempts: max_attempts,
        })
    }

    /// PendingHold -> Committed on payment confirmation. Confirming an already committed
    /// session returns the existing package.
    pub async fn confirm_payment(
        &self,
        session: &mut OrderSession,
        method: PaymentMethod,
    ) -> Result<PackageRecord, OrderError> {
        session.ensure(
            &[OrderState::PendingHold, OrderState::Committed],
            "confirm payment for",
        )?;
        let Some(tracking_id) = session.tracking_id().cloned() else {
            return Err(OrderError::InvalidTransition {
                state: session.state(),
                action: "confirm payment for",
            });
        };

        let record = self.commit(&tracking_id, method).await?;
        session.record_commit();
        Ok(record)
    }

    /// Commits the pending order behind `tracking_id` as a package record and removes the hold.
    ///
    /// Idempotent: a package already committed from this hold is returned as is. A package that
    /// belongs to a different order is reported as a conflict. In both failure cases, and when the
    /// package cannot be written, the pending order is left untouched.
    pub async fn commit(
        &self,
        tracking_id: &TrackingId,
        method: PaymentMethod,
    ) -> Result<PackageRecord, OrderError> {
        let existing = self.package(tracking_id).await?;
        let pending = self.pending.get(tracking_id).await?;

        let pending = match (existing, pending) {
            (Some(existing), None) => {
                self.metrics
                    .commits_total
                    .with_label_values(&["already_committed"])
                    .inc();
                info!(tracking_id = %tracking_id, "package already committed");
                return Ok(existing);
            }
            (Some(existing), Some(pending)) => {
                return self.settle_existing(tracking_id, existing, &pending).await;
            }
            (None, None) => return Err(OrderError::PendingOrderNotFound(tracking_id.clone())),
            (None, Some(pending)) => pending,
        };

        if method == PaymentMethod::Qr && !self.config.qr_payments_enabled {
            return Err(OrderError::PaymentMethodUnavailable(method));
        }

        let record = PackageRecord::from_pending(&pending, method, Utc::now());
        let row = schema::encode(&record)?;

        let written = match schema::insert_with_schema_retry(
            self.packages.as_ref(),
            &self.package_caps,
            tracking_id.as_str(),
            row,
        )
        .await
        {
            Ok((path, written)) => {
                if path == WritePath::Stripped {
                    self.metrics
                        .schema_retries_total
                        .with_label_values(&[PACKAGES.name])
                        .inc();
                }
                written
            }
            Err(StoreError::DuplicateKey(key)) => {
                // Lost a race with a concurrent commit of the same order, or of another one.
                if let Some(existing) = self.package(tracking_id).await? {
                    return self.settle_existing(tracking_id, existing, &pending).await;
                }
                self.metrics.commits_total.with_label_values(&["failed"]).inc();
                return Err(StoreError::DuplicateKey(key).into());
            }
            Err(err) => {
                self.metrics.commits_total.with_label_values(&["failed"]).inc();
                error!(
                    tracking_id = %tracking_id,
                    error = %err,
                    "package commit failed; pending order kept"
                );
                return Err(err.into());
            }
        };

        let committed: PackageRecord = schema::decode(written)?;
        self.release_hold(tracking_id).await;

        self.metrics
            .commits_total
            .with_label_values(&["committed"])
            .inc();
        info!(
            tracking_id = %tracking_id,
            status = %committed.status,
            price = %committed.price,
            "package committed"
        );

        Ok(committed)
    }

    /// Quoted/PendingHold -> Abandoned. The pending order is left to expire.
    pub fn abandon(&self, session: &mut OrderSession) -> Result<(), OrderError> {
        session.abandon()?;
        info!(
            session_id = %session.id,
            tracking_id = ?session.tracking_id().map(TrackingId::as_str),
            "order abandoned"
        );
        Ok(())
    }

    pub async fn pending_order(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<PendingOrder>, OrderError> {
        Ok(self.pending.get(tracking_id).await?)
    }

    pub async fn package(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<PackageRecord>, OrderError> {
        match self.packages.get(tracking_id.as_str()).await? {
            Some(row) => Ok(Some(schema::decode(row)?)),
            None => Ok(None),
        }
    }

    pub async fn lookup(
        &self,
        tracking_id: &TrackingId,
    ) -> Result<Option<TrackedOrder>, OrderError> {
        if let Some(package) = self.package(tracking_id).await? {
            return Ok(Some(TrackedOrder::Package(package)));
        }
        Ok(self
            .pending_order(tracking_id)
            .await?
            .map(TrackedOrder::Pending))
    }

    pub fn purge_expired_holds(&self) -> usize {
        self.pending.purge_expired_local(Utc::now())
    }

    /// A package already exists for the id. If it was committed from this hold the hold is
    /// released; otherwise the id belongs to another order and the hold is left untouched.
    async fn settle_existing(
        &self,
        tracking_id: &TrackingId,
        existing: PackageRecord,
        pending: &PendingOrder,
    ) -> Result<PackageRecord, OrderError> {
        if !existing.committed_from(pending) {
            self.metrics
                .commits_total
                .with_label_values(&["conflict"])
                .inc();
            error!(
                tracking_id = %tracking_id,
                "tracking id already committed for a different order; pending order kept"
            );
            return Err(OrderError::TrackingIdConflict(tracking_id.clone()));
        }

        self.metrics
            .commits_total
            .with_label_values(&["already_committed"])
            .inc();
        info!(tracking_id = %tracking_id, "package already committed");
        self.release_hold(tracking_id).await;
        Ok(existing)
    }

    async fn release_hold(&self, tracking_id: &TrackingId) {
        if let Err(err) = self.pending.delete(tracking_id).await {
            warn!(
                tracking_id = %tracking_id,
                error = %err,
                "pending order not removed; package record takes precedence"
            );
        }
    }
}

pub fn validate(draft: &OrderDraft, customer: &CustomerRef) -> Result<(), ValidationError> {
    if draft.sender.address.trim().is_empty() {
        return Err(ValidationError::MissingSenderAddress);
    }
    if draft.receiver.address.trim().is_empty() {
        return Err(ValidationError::MissingReceiverAddress);
    }

    let has_weight = draft
        .weight
        .as_deref()
        .is_some_and(|weight| !weight.trim().is_empty());
    if draft.package_type.requires_weight() && !has_weight {
        return Err(ValidationError::MissingWeight(draft.package_type));
    }

    match draft.delivery_speed {
        None => return Err(ValidationError::MissingDeliverySpeed),
        Some(DeliverySpeed::Scheduled) if draft.scheduled_time.is_none() => {
            return Err(ValidationError::MissingScheduledTime);
        }
        Some(_) => {}
    }

    if draft.cod_amount.is_some_and(|amount| amount.is_nan() || amount < 0.0) {
        return Err(ValidationError::NegativeCodAmount);
    }
    if draft.cod_amount.is_some_and(|amount| amount > 0.0) && !customer.tier.allows_cod() {
        return Err(ValidationError::CodNotAllowed);
    }

    Ok(())
}

fn pending_snapshot(
    session: &OrderSession,
    draft: &OrderDraft,
    quote: &Quote,
    tracking_id: TrackingId,
) -> PendingOrder {
    let store = session.store.as_ref();

    PendingOrder {
        tracking_id,
        sender_name: draft.sender.name.clone(),
        sender_phone: draft.sender.phone.clone(),
        sender_address: draft.sender.address.clone(),
        sender_latitude: draft.sender.location.map(|p| p.lat),
        sender_longitude: draft.sender.location.map(|p| p.lng),
        receiver_name: draft.receiver.name.clone(),
        receiver_phone: draft.receiver.phone.clone(),
        receiver_address: draft.receiver.address.clone(),
        receiver_latitude: draft.receiver.location.map(|p| p.lat),
        receiver_longitude: draft.receiver.location.map(|p| p.lng),
        package_type: draft.package_type,
        weight: draft.effective_weight(),
        delivery_speed: draft.delivery_speed,
        scheduled_delivery_time: match draft.delivery_speed {
            Some(DeliverySpeed::Scheduled) => draft.scheduled_time,
            _ => None,
        },
        price: quote.price,
        distance: quote.distance.rounded_km,
        payment_method: draft.payment_method,
        cod_amount: draft.cod_amount.unwrap_or(0.0),
        customer_email: session.customer.email.clone(),
        customer_name: session.customer.name.clone(),
        customer_id: session.customer.id.clone(),
        delivery_store_id: store.map(|s| s.store_id.clone()),
        delivery_store_name: store.map(|s| s.store_name.clone()),
        sender_code: store.and_then(|s| s.sender_code.clone()),
    }
}
