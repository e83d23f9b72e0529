use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// Number of fine units in one coarse unit.
pub const FINE_PER_COARSE: u64 = 1_000_000;

/// Simulated time as a (coarse, fine) pair.
///
/// `fine` is always normalized into `[0, FINE_PER_COARSE)`. No real-world unit
/// is attached to either component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SimTime {
    coarse: u64,
    fine: u32,
}

impl SimTime {
    pub const ZERO: SimTime = SimTime { coarse: 0, fine: 0 };

    /// Build a time value, carrying any fine overflow into the coarse part.
    pub fn new(coarse: u64, fine: u64) -> Self {
        Self {
            coarse: coarse.saturating_add(fine / FINE_PER_COARSE),
            fine: (fine % FINE_PER_COARSE) as u32,
        }
    }

    pub fn from_fine(total: u64) -> Self {
        Self::new(0, total)
    }

    pub fn coarse(&self) -> u64 {
        self.coarse
    }

    pub fn fine(&self) -> u32 {
        self.fine
    }

    /// Total length expressed in fine units.
    pub fn as_fine(&self) -> u64 {
        self.coarse
            .saturating_mul(FINE_PER_COARSE)
            .saturating_add(u64::from(self.fine))
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn checked_sub(self, rhs: SimTime) -> Option<SimTime> {
        let mut coarse = self.coarse.checked_sub(rhs.coarse)?;
        let fine = if self.fine >= rhs.fine {
            self.fine - rhs.fine
        } else {
            coarse = coarse.checked_sub(1)?;
            (FINE_PER_COARSE as u32 + self.fine) - rhs.fine
        };
        Some(SimTime { coarse, fine })
    }

    pub fn saturating_sub(self, rhs: SimTime) -> SimTime {
        self.checked_sub(rhs).unwrap_or(Self::ZERO)
    }

    /// Scale by an integer factor (used for per-level quanta).
    pub fn scaled(self, factor: u64) -> SimTime {
        SimTime::from_fine(self.as_fine().saturating_mul(factor))
    }

    /// Integer division over the whole value, used to turn sums into averages.
    pub fn div_by(self, divisor: u64) -> SimTime {
        if divisor == 0 {
            return Self::ZERO;
        }
        SimTime::from_fine(self.as_fine() / divisor)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        SimTime::new(
            self.coarse.saturating_add(rhs.coarse),
            u64::from(self.fine) + u64::from(rhs.fine),
        )
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        *self = *self + rhs;
    }
}

// Saturates at zero; simulated durations are never negative.
impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:06}", self.coarse, self.fine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_normalizes_fine_overflow() {
        let t = SimTime::new(2, 3_500_000);
        assert_eq!(t.coarse(), 5);
        assert_eq!(t.fine(), 500_000);
    }

    #[test]
    fn add_carries_into_coarse() {
        let t = SimTime::new(0, 999_950) + SimTime::new(1, 100);
        assert_eq!(t, SimTime::new(2, 50));
    }

    #[test]
    fn sub_borrows_and_saturates() {
        assert_eq!(
            SimTime::new(3, 10) - SimTime::new(1, 20),
            SimTime::new(1, 999_990)
        );
        assert_eq!(SimTime::new(1, 0) - SimTime::new(2, 0), SimTime::ZERO);
        assert_eq!(SimTime::new(1, 0).checked_sub(SimTime::new(1, 1)), None);
    }

    #[test]
    fn ordering_is_lexicographic() {
        assert!(SimTime::new(1, 0) > SimTime::new(0, 999_999));
        assert!(SimTime::new(1, 5) < SimTime::new(1, 6));
    }

    #[test]
    fn scaled_and_div_by_work_on_whole_value() {
        assert_eq!(SimTime::from_fine(600_000).scaled(2), SimTime::new(1, 200_000));
        assert_eq!(SimTime::new(3, 0).div_by(2), SimTime::new(1, 500_000));
        assert_eq!(SimTime::new(3, 0).div_by(0), SimTime::ZERO);
    }

    #[test]
    fn display_pads_fine_part() {
        assert_eq!(SimTime::new(4, 42).to_string(), "4:000042");
    }
}
