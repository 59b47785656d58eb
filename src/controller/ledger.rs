use crate::Cents;

use super::error::LedgerError;

/// Accumulated customer credit and the denominations usable for change.
#[derive(Debug, Default)]
pub struct CreditLedger {
    credit: Cents,
    /// Highest first.
    denominations: Vec<Cents>,
}

impl CreditLedger {
    pub fn new(mut denominations: Vec<Cents>) -> Self {
        denominations.sort_unstable_by(|a, b| b.cmp(a));
        denominations.dedup();
        Self {
            credit: Cents::ZERO,
            denominations,
        }
    }

    /// Credit a coin the coin slot already accepted.
    pub fn add_credit(&mut self, value: Cents) {
        self.credit = self.credit.saturating_add(value);
    }

    pub fn deduct_credit(&mut self, value: Cents) -> Result<(), LedgerError> {
        self.credit = self
            .credit
            .checked_sub(value)
            .ok_or(LedgerError::InsufficientCredit {
                credit: self.credit,
                requested: value,
            })?;
        Ok(())
    }

    pub fn current_credit(&self) -> Cents {
        self.credit
    }

    pub fn denominations(&self) -> &[Cents] {
        &self.denominations
    }
}
