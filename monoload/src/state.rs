/// Explicit lifecycle state for a [`Loader`](crate::Loader).
///
/// Replaces the started/reset flag pair of classic loader frameworks with an
/// explicit enumeration, so "reset wins over late delivery" is a transition
/// guard rather than an incidental check.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Created, never started.
    #[default]
    Idle,
    /// Observer attached, a background load is in flight.
    Loading,
    /// Observer attached, latest result has been delivered.
    Delivered,
    /// Observer detached; the cached result is retained for re-delivery.
    Stopped,
    /// Permanently torn down. Terminal: no state is reachable from here.
    Reset,
}

impl LifecycleState {
    /// Whether an observer is currently attached (deliveries are forwarded).
    pub fn is_started(self) -> bool {
        matches!(self, Self::Loading | Self::Delivered)
    }

    /// Whether the loader has been permanently torn down.
    pub fn is_reset(self) -> bool {
        self == Self::Reset
    }

    /// Whether a delivered result may still be cached.
    ///
    /// Everything but `Reset` accepts delivery; non-started states cache
    /// without forwarding.
    pub fn accepts_delivery(self) -> bool {
        !self.is_reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        assert_eq!(LifecycleState::default(), LifecycleState::Idle);
    }

    #[test]
    fn started_states() {
        assert!(LifecycleState::Loading.is_started());
        assert!(LifecycleState::Delivered.is_started());

        assert!(!LifecycleState::Idle.is_started());
        assert!(!LifecycleState::Stopped.is_started());
        assert!(!LifecycleState::Reset.is_started());
    }

    #[test]
    fn only_reset_rejects_delivery() {
        for state in [
            LifecycleState::Idle,
            LifecycleState::Loading,
            LifecycleState::Delivered,
            LifecycleState::Stopped,
        ] {
            assert!(state.accepts_delivery(), "{state:?} should accept delivery");
            assert!(!state.is_reset());
        }

        assert!(!LifecycleState::Reset.accepts_delivery());
        assert!(LifecycleState::Reset.is_reset());
    }
}
