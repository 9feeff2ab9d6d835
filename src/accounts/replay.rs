use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use uuid::Uuid;

/// Single-use enforcement for activation tickets. Redeemed `jti` values are
/// held until the ticket would have expired anyway, so a still-valid token
/// cannot be replayed; expired entries are pruned on the way in.
#[derive(Clone, Default)]
pub struct ReplayGuard {
    redeemed: Arc<Mutex<HashMap<Uuid, i64>>>,
}

impl ReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a redemption. Returns `false` when `jti` was already redeemed
    /// within its validity window.
    pub fn redeem(&self, jti: Uuid, expires_at: i64) -> bool {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let mut redeemed = match self.redeemed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        redeemed.retain(|_, exp| *exp > now);
        if redeemed.contains_key(&jti) {
            return false;
        }
        redeemed.insert(jti, expires_at);
        true
    }

    /// Forgets a recorded redemption. Used when persisting the activated
    /// account fails after the claim was taken, so the still-valid ticket
    /// can be retried.
    pub fn release(&self, jti: Uuid) {
        let mut redeemed = match self.redeemed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        redeemed.remove(&jti);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_five_minutes() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp() + 300
    }

    #[test]
    fn first_redemption_succeeds_second_fails() {
        let guard = ReplayGuard::new();
        let jti = Uuid::new_v4();
        assert!(guard.redeem(jti, in_five_minutes()));
        assert!(!guard.redeem(jti, in_five_minutes()));
    }

    #[test]
    fn distinct_tickets_do_not_interfere() {
        let guard = ReplayGuard::new();
        assert!(guard.redeem(Uuid::new_v4(), in_five_minutes()));
        assert!(guard.redeem(Uuid::new_v4(), in_five_minutes()));
    }

    #[test]
    fn released_ticket_can_be_redeemed_again() {
        // A failed insert must not burn the ticket: claim, release as the
        // activation error path does, then the retry claims it again.
        let guard = ReplayGuard::new();
        let jti = Uuid::new_v4();
        assert!(guard.redeem(jti, in_five_minutes()));
        guard.release(jti);
        assert!(guard.redeem(jti, in_five_minutes()));
        assert!(!guard.redeem(jti, in_five_minutes()));
    }

    #[test]
    fn releasing_an_unknown_ticket_is_a_no_op() {
        let guard = ReplayGuard::new();
        guard.release(Uuid::new_v4());
        assert!(guard.redeem(Uuid::new_v4(), in_five_minutes()));
    }

    #[test]
    fn expired_entries_are_pruned() {
        let guard = ReplayGuard::new();
        let jti = Uuid::new_v4();
        let past = OffsetDateTime::now_utc().unix_timestamp() - 1;
        assert!(guard.redeem(jti, past));
        // The entry has expired, so the ticket id is no longer tracked. The
        // token itself would fail signature verification on expiry by now.
        assert!(guard.redeem(jti, in_five_minutes()));
    }
}
