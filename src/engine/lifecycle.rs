use crate::models::update::{RejectionReason, TrackingStatus};

/// How an accepted proposal affects the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Status rank moves forward (or enters `Cancelled`).
    Advance,
    /// Same status resubmitted: location-only refresh, not a transition.
    Refresh,
}

fn rank(status: TrackingStatus) -> u8 {
    match status {
        TrackingStatus::Pending => 0,
        TrackingStatus::Confirmed => 1,
        TrackingStatus::InTransit => 2,
        TrackingStatus::OutForDelivery => 3,
        TrackingStatus::Delivered => 4,
        // Cancelled sits outside the linear ranking; handled explicitly.
        TrackingStatus::Cancelled => 5,
    }
}

/// Monotonic-forward rule: accept iff `rank(proposed) >= rank(current)`,
/// or the proposal is `Cancelled` from a non-terminal state. Anything
/// proposed against a terminal state is rejected.
pub fn validate_transition(
    current: TrackingStatus,
    proposed: TrackingStatus,
) -> Result<Transition, RejectionReason> {
    if current.is_terminal() {
        return Err(RejectionReason::TerminalState);
    }

    if proposed == current {
        return Ok(Transition::Refresh);
    }

    if proposed == TrackingStatus::Cancelled {
        return Ok(Transition::Advance);
    }

    if rank(proposed) >= rank(current) {
        Ok(Transition::Advance)
    } else {
        Err(RejectionReason::InvalidTransition)
    }
}

#[cfg(test)]
mod tests {
    use super::{validate_transition, Transition};
    use crate::models::update::{RejectionReason, TrackingStatus};

    use TrackingStatus::*;

    #[test]
    fn forward_transitions_advance() {
        assert_eq!(validate_transition(Pending, Confirmed), Ok(Transition::Advance));
        assert_eq!(validate_transition(Confirmed, InTransit), Ok(Transition::Advance));
        assert_eq!(
            validate_transition(InTransit, OutForDelivery),
            Ok(Transition::Advance)
        );
        assert_eq!(
            validate_transition(OutForDelivery, Delivered),
            Ok(Transition::Advance)
        );
    }

    #[test]
    fn skipping_states_forward_is_allowed() {
        assert_eq!(validate_transition(Pending, Delivered), Ok(Transition::Advance));
        assert_eq!(validate_transition(Confirmed, OutForDelivery), Ok(Transition::Advance));
    }

    #[test]
    fn backward_transitions_are_rejected() {
        assert_eq!(
            validate_transition(InTransit, Confirmed),
            Err(RejectionReason::InvalidTransition)
        );
        assert_eq!(
            validate_transition(OutForDelivery, Pending),
            Err(RejectionReason::InvalidTransition)
        );
    }

    #[test]
    fn same_status_is_a_refresh() {
        assert_eq!(validate_transition(InTransit, InTransit), Ok(Transition::Refresh));
        assert_eq!(validate_transition(Pending, Pending), Ok(Transition::Refresh));
    }

    #[test]
    fn cancel_is_allowed_from_any_non_terminal_state() {
        for current in [Pending, Confirmed, InTransit, OutForDelivery] {
            assert_eq!(
                validate_transition(current, Cancelled),
                Ok(Transition::Advance),
                "cancel from {current:?}"
            );
        }
    }

    #[test]
    fn terminal_states_reject_everything() {
        for current in [Delivered, Cancelled] {
            for proposed in [Pending, Confirmed, InTransit, OutForDelivery, Delivered, Cancelled] {
                assert_eq!(
                    validate_transition(current, proposed),
                    Err(RejectionReason::TerminalState),
                    "{current:?} -> {proposed:?}"
                );
            }
        }
    }
}
