use serde::{Deserialize, Serialize};

/// Reservations made outside the assignment grid, e.g. by league games.
pub trait LockOracle {
    fn is_reserved(&self, location: &str, slot: usize, division: Option<&str>) -> bool;
}

/// Nothing is reserved
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocks;

impl LockOracle for NoLocks {
    fn is_reserved(&self, _location: &str, _slot: usize, _division: Option<&str>) -> bool {
        false
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub location: String,
    pub slot: usize,
    /// Division holding the reservation; it does not lock itself out
    #[serde(default)]
    pub division: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationTable {
    pub reservations: Vec<Reservation>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserve(&mut self, location: impl Into<String>, slot: usize, division: Option<String>) {
        self.reservations.push(Reservation {
            location: location.into(),
            slot,
            division,
        });
    }

    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }
}

impl LockOracle for ReservationTable {
    fn is_reserved(&self, location: &str, slot: usize, division: Option<&str>) -> bool {
        self.reservations.iter().any(|r| {
            r.location == location
                && r.slot == slot
                && !matches!((r.division.as_deref(), division), (Some(owner), Some(d)) if owner == d)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_scoped_reservation_only_locks_out_others() {
        let mut table = ReservationTable::new();
        table.reserve("Field A", 3, Some("Seniors".to_string()));
        table.reserve("Gym", 1, None);

        assert!(table.is_reserved("Field A", 3, Some("Juniors")));
        assert!(table.is_reserved("Field A", 3, None));
        assert!(!table.is_reserved("Field A", 3, Some("Seniors")));
        assert!(!table.is_reserved("Field A", 4, Some("Juniors")));
        assert!(table.is_reserved("Gym", 1, Some("Seniors")));
    }
}
