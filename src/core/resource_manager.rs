//! Admission control: grants, denies and releases capacity reservations.
//!
//! [`LimitedResourceManager`] books usage against a [`Limiter`] under a single
//! `parking_lot::Mutex`, so concurrent callers near a ceiling are served
//! first-come first-served by lock acquisition order. Nothing ever waits for
//! capacity: a request that does not fit fails with
//! [`SchedulerError::ResourceExhausted`] and the caller backs off.
//!
//! [`NullResourceManager`] satisfies the same trait when admission control is
//! disabled.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::core::limit::{
    Dimension, Limiter, PriorityClass, ResourceLimit, ResourceRequest, ResourceUsage,
};
use crate::core::metrics::NodeMetrics;
use crate::core::SchedulerError;

/// Opaque reservation identifier.
pub type ReservationId = Uuid;

/// Proof of a granted reservation. Hand it back to
/// [`ResourceManager::release`] exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReservationHandle {
    id: ReservationId,
    class: PriorityClass,
}

impl ReservationHandle {
    fn new(class: PriorityClass) -> Self {
        Self {
            id: Uuid::new_v4(),
            class,
        }
    }

    /// Reservation identifier.
    pub const fn id(&self) -> ReservationId {
        self.id
    }

    /// Class the reservation was booked in.
    pub const fn class(&self) -> PriorityClass {
        self.class
    }
}

impl fmt::Display for ReservationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.class, self.id)
    }
}

/// A live claim on capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceReservation {
    /// Reservation identifier.
    pub id: ReservationId,
    /// Amounts booked.
    pub request: ResourceRequest,
}

/// Read-only usage snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStat {
    /// Node-wide booked usage.
    pub system: ResourceUsage,
    /// Booked usage per class, indexed by [`PriorityClass::rank`].
    pub classes: [ResourceUsage; 3],
    /// Reservations currently live.
    pub live_reservations: usize,
}

impl ResourceStat {
    /// Usage booked by one class.
    pub const fn class(&self, class: PriorityClass) -> &ResourceUsage {
        &self.classes[class.rank()]
    }
}

/// Admission control contract shared by every task producer.
pub trait ResourceManager: Send + Sync {
    /// Atomically check and book `request`.
    fn reserve(&self, request: ResourceRequest) -> Result<ReservationHandle, SchedulerError>;

    /// Return the usage booked by `handle`. Releasing a handle that is not
    /// live is a defect and is reported, never ignored.
    fn release(&self, handle: ReservationHandle) -> Result<(), SchedulerError>;

    /// Limit governing a class.
    fn limits_of(&self, class: PriorityClass) -> ResourceLimit;

    /// Current usage snapshot.
    fn usage(&self) -> ResourceStat;
}

#[derive(Debug, Default)]
struct Ledger {
    system: ResourceUsage,
    classes: [ResourceUsage; 3],
    live: HashMap<ReservationId, ResourceReservation>,
}

/// Resource manager enforcing a [`Limiter`].
pub struct LimitedResourceManager {
    limiter: Limiter,
    ledger: Mutex<Ledger>,
    metrics: Arc<NodeMetrics>,
    strict_release: bool,
}

impl LimitedResourceManager {
    /// Create a manager. Unknown releases panic in debug builds.
    pub fn new(limiter: Limiter, metrics: Arc<NodeMetrics>) -> Self {
        Self {
            limiter,
            ledger: Mutex::new(Ledger::default()),
            metrics,
            strict_release: cfg!(debug_assertions),
        }
    }

    /// Choose whether an unknown release panics (`true`) or only returns
    /// [`SchedulerError::UnknownReservation`] (`false`).
    #[must_use]
    pub const fn with_strict_release(mut self, strict: bool) -> Self {
        self.strict_release = strict;
        self
    }

    /// Configured limiter.
    pub const fn limiter(&self) -> &Limiter {
        &self.limiter
    }

    fn deny(&self, class: PriorityClass, dimension: Dimension) -> SchedulerError {
        self.metrics.record_denial(class);
        warn!(%class, %dimension, "reservation denied");
        SchedulerError::ResourceExhausted { class, dimension }
    }
}

impl ResourceManager for LimitedResourceManager {
    fn reserve(&self, request: ResourceRequest) -> Result<ReservationHandle, SchedulerError> {
        if request.is_negative() {
            return Err(SchedulerError::InvalidRequest(format!(
                "negative amounts in {request:?}"
            )));
        }
        let class = request.class;

        let overflow =
            || SchedulerError::InvalidRequest(format!("{request:?} overflows booked usage"));

        let mut ledger = self.ledger.lock();
        let system = ledger.system.checked_plus(&request).ok_or_else(overflow)?;
        if let Err(dimension) = self.limiter.system.admits(&system) {
            return Err(self.deny(class, dimension));
        }
        let scoped = ledger.classes[class.rank()]
            .checked_plus(&request)
            .ok_or_else(overflow)?;
        if let Some(limit) = self.limiter.class_limit(class) {
            if let Err(dimension) = limit.admits(&scoped) {
                return Err(self.deny(class, dimension));
            }
        }

        let handle = ReservationHandle::new(class);
        ledger.system = system;
        ledger.classes[class.rank()] = scoped;
        ledger.live.insert(
            handle.id,
            ResourceReservation {
                id: handle.id,
                request,
            },
        );
        drop(ledger);

        self.metrics.record_grant(class);
        debug!(reservation = %handle, memory = request.memory_bytes, "reservation granted");
        Ok(handle)
    }

    fn release(&self, handle: ReservationHandle) -> Result<(), SchedulerError> {
        let mut ledger = self.ledger.lock();
        let Some(reservation) = ledger.live.remove(&handle.id) else {
            drop(ledger);
            error!(reservation = %handle, "release of unknown reservation");
            assert!(
                !self.strict_release,
                "reservation {handle} released twice or never acquired"
            );
            return Err(SchedulerError::UnknownReservation(handle.id));
        };
        let request = reservation.request;
        ledger.system = ledger.system.minus(&request);
        let rank = request.class.rank();
        ledger.classes[rank] = ledger.classes[rank].minus(&request);
        drop(ledger);

        debug!(reservation = %handle, "reservation released");
        Ok(())
    }

    fn limits_of(&self, class: PriorityClass) -> ResourceLimit {
        self.limiter.limits_of(class)
    }

    fn usage(&self) -> ResourceStat {
        let ledger = self.ledger.lock();
        ResourceStat {
            system: ledger.system,
            classes: ledger.classes,
            live_reservations: ledger.live.len(),
        }
    }
}

/// Resource manager used when admission control is disabled: grants every
/// request and ignores releases.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullResourceManager;

impl ResourceManager for NullResourceManager {
    fn reserve(&self, request: ResourceRequest) -> Result<ReservationHandle, SchedulerError> {
        Ok(ReservationHandle::new(request.class))
    }

    fn release(&self, _handle: ReservationHandle) -> Result<(), SchedulerError> {
        Ok(())
    }

    fn limits_of(&self, _class: PriorityClass) -> ResourceLimit {
        ResourceLimit::unlimited()
    }

    fn usage(&self) -> ResourceStat {
        ResourceStat::default()
    }
}
