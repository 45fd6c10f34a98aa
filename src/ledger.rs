//! Points ledger arithmetic.
//!
//! # Invariants
//! - `balance >= 0` and `lifetime >= 0` (unsigned, every decrement floored)
//! - `credit` is the only operation that raises either figure
//!
//! Persisting the result is the store's job; callers read a participant,
//! apply one of these operations and write both figures back inside the
//! same unit of work.

use serde::{Deserialize, Serialize};

use crate::error::ChoreError;
use crate::model::Participant;

/// A participant's spendable and lifetime points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balance {
    /// Points available to spend
    balance: u64,

    /// Points earned over time
    lifetime: u64,
}

impl Balance {
    pub fn new(balance: u64, lifetime: u64) -> Self {
        Self { balance, lifetime }
    }

    pub fn of(participant: &Participant) -> Self {
        Self::new(participant.balance, participant.lifetime)
    }

    /// Write both figures back onto the participant record.
    pub fn apply_to(&self, participant: &mut Participant) {
        participant.balance = self.balance;
        participant.lifetime = self.lifetime;
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn lifetime(&self) -> u64 {
        self.lifetime
    }

    /// Check if `cost` can be debited from the balance.
    pub fn can_afford(&self, cost: u64) -> bool {
        cost <= self.balance
    }

    /// Award points for completed work.
    ///
    /// # Postcondition
    /// Both `balance` and `lifetime` increase by `amount`.
    ///
    /// # Errors
    /// `Validation` if `amount == 0` or the sum overflows.
    pub fn credit(&self, amount: u64) -> Result<Balance, ChoreError> {
        require_positive(amount)?;
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| ChoreError::Validation("balance overflow".to_string()))?;
        let lifetime = self
            .lifetime
            .checked_add(amount)
            .ok_or_else(|| ChoreError::Validation("lifetime overflow".to_string()))?;
        Ok(Balance { balance, lifetime })
    }

    /// Spend points. Only the balance moves; lifetime keeps what was earned.
    ///
    /// # Errors
    /// `InsufficientFunds` if `amount > balance`.
    pub fn debit(&self, amount: u64) -> Result<Balance, ChoreError> {
        require_positive(amount)?;
        if !self.can_afford(amount) {
            return Err(ChoreError::InsufficientFunds {
                needed: amount,
                available: self.balance,
            });
        }
        Ok(Balance {
            balance: self.balance - amount,
            lifetime: self.lifetime,
        })
    }

    /// Take points away as a penalty.
    ///
    /// Balance and lifetime are floored at zero independently, so when one
    /// of them hits the floor first the two drop by different amounts.
    pub fn penalize(&self, amount: u64) -> Result<Balance, ChoreError> {
        require_positive(amount)?;
        Ok(self.floor_subtract(amount))
    }

    /// Undo an award. Same flooring as [`Balance::penalize`].
    pub fn reverse(&self, amount: u64) -> Result<Balance, ChoreError> {
        require_positive(amount)?;
        Ok(self.floor_subtract(amount))
    }

    fn floor_subtract(&self, amount: u64) -> Balance {
        Balance {
            balance: self.balance.saturating_sub(amount),
            lifetime: self.lifetime.saturating_sub(amount),
        }
    }
}

fn require_positive(amount: u64) -> Result<(), ChoreError> {
    if amount == 0 {
        return Err(ChoreError::Validation(
            "amount must be positive".to_string(),
        ));
    }
    Ok(())
}
