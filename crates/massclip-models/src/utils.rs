//! Small helpers shared across crates.

use uuid::Uuid;

/// Generate a new document ID.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Convert a major-unit amount (e.g. 9.99) to minor units (999).
pub fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

/// Convert minor units reported by the payment gateway to a major-unit amount.
pub fn from_minor_units(amount: i64) -> f64 {
    amount as f64 / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_units_rounding() {
        assert_eq!(to_minor_units(9.99), 999);
        assert_eq!(to_minor_units(0.5), 50);
        assert_eq!(to_minor_units(999.99), 99999);
        assert_eq!(from_minor_units(1999), 19.99);
    }

    #[test]
    fn test_new_id_is_unique() {
        assert_ne!(new_id(), new_id());
        assert_eq!(new_id().len(), 32);
    }
}
