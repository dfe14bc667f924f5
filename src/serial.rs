use rand::Rng;

use crate::aliases::DieselError;

/// Attempts before an insert retrying on serial collisions gives up.
pub const MAX_SERIAL_ATTEMPTS: usize = 5;

/// Random human-facing serial number for orders and transactions.
/// Uniqueness is enforced by the DB unique constraint; callers retry on a
/// unique violation rather than pre-checking.
pub fn generate() -> i32 {
    rand::thread_rng().gen_range(111_111..=9_999_999)
}

pub fn is_unique_violation(err: &DieselError) -> bool {
    matches!(
        err,
        DieselError::DatabaseError(diesel::result::DatabaseErrorKind::UniqueViolation, _)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serials_stay_inside_the_human_facing_range() {
        for _ in 0..1_000 {
            let serial = generate();
            assert!((111_111..=9_999_999).contains(&serial));
        }
    }

    #[test]
    fn only_unique_violations_are_retryable() {
        assert!(!is_unique_violation(&DieselError::NotFound));
    }
}
