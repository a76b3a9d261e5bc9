//! IdGenerator port.

use ulid::Ulid;

use crate::domain::RequestId;
use crate::ports::Clock;

/// Source of request ids.
///
/// Ids must be unique among live items; generated ids are unique outright.
pub trait IdGenerator: Send + Sync {
    fn generate_request_id(&self) -> RequestId;
}

/// ULID-based generator. The timestamp part comes from `C`, so a
/// `FixedClock` makes the time component deterministic in tests.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_request_id(&self) -> RequestId {
        let timestamp_ms = u64::try_from(self.clock.now().timestamp_millis()).unwrap_or(0);
        RequestId::from_ulid(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
