use std::fmt;

/// Money in minor currency units (cents). Never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cents(u32);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub const fn new(value: u32) -> Self {
        Cents(value)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Subtraction that refuses to go below zero.
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Cents)
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Cents(self.0.saturating_sub(rhs.0))
    }

    pub fn saturating_add(self, rhs: Self) -> Self {
        Cents(self.0.saturating_add(rhs.0))
    }

    /// How many whole `unit`s fit into `self`. Zero-valued units fit zero times.
    pub fn units_of(self, unit: Self) -> u32 {
        self.0.checked_div(unit.0).unwrap_or(0)
    }
}

impl From<u32> for Cents {
    fn from(value: u32) -> Self {
        Cents(value)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dollars = self.0 / 100;
        let cents = self.0 % 100;
        write!(f, "${dollars}.{cents:02}")
    }
}

// Saturates at `u32::MAX` rather than overflowing.
impl std::ops::Add for Cents {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        self.saturating_add(rhs)
    }
}

impl std::ops::AddAssign for Cents {
    fn add_assign(&mut self, rhs: Self) {
        *self = self.saturating_add(rhs);
    }
}

impl std::ops::Mul<u32> for Cents {
    type Output = Self;

    fn mul(self, rhs: u32) -> Self::Output {
        Cents(self.0.saturating_mul(rhs))
    }
}

impl std::iter::Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Cents::ZERO, |acc, c| acc + c)
    }
}
