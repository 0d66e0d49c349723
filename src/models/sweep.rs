//! Sweep outcome

use serde::Serialize;
use utoipa::ToSchema;

/// Counters reported by every scheduled sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Records matched by the sweep query
    pub scanned: usize,
    /// Records whose status actually changed
    pub transitioned: usize,
    pub fines_created: usize,
}
