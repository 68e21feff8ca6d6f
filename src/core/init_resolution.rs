//! Whether a fetch response settles a pending initial-sync waiter.
//!
//! Transport errors never reach this policy: the coordinator rejects the
//! waiter directly.

use timeline_protocol::FetchDirection;

#[derive(Debug, Clone, Copy)]
pub struct InitResolutionInput {
    pub has_active_init_deferred: bool,
    pub is_initializing: bool,
    /// Direction the pending waiter was issued with.
    pub init_request_direction: Option<FetchDirection>,
    pub response_direction: FetchDirection,
    pub reset: bool,
    /// Response was rejected wholesale as belonging to a retired epoch.
    pub response_stale: bool,
}

#[must_use]
pub fn should_resolve(input: InitResolutionInput) -> bool {
    if !input.has_active_init_deferred || input.response_stale {
        return false;
    }

    // Orphaned waiter: nothing else would ever settle it.
    if !input.is_initializing {
        return true;
    }

    match input.init_request_direction {
        Some(FetchDirection::Tail) => {
            input.response_direction == FetchDirection::Tail || input.reset
        }
        Some(FetchDirection::After) => input.response_direction == FetchDirection::After,
        Some(FetchDirection::Before) | None => false,
    }
}
