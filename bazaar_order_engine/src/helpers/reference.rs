use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::PaymentTarget;

pub const REFERENCE_SUFFIX_LENGTH: usize = 16;

/// Generates a fresh payment reference for `target`, e.g. `BZR-O17-Xq3kTz0vB81LmQa2`.
///
/// The random suffix makes references unguessable. Uniqueness is still enforced by the database.
pub fn new_payment_reference(prefix: &str, target: PaymentTarget) -> String {
    let tag = match target {
        PaymentTarget::Order(id) => format!("O{id}"),
        PaymentTarget::Registration(id) => format!("R{id}"),
    };
    let suffix: String =
        rand::thread_rng().sample_iter(&Alphanumeric).take(REFERENCE_SUFFIX_LENGTH).map(char::from).collect();
    format!("{prefix}-{tag}-{suffix}")
}

/// References arriving from callbacks are checked against this shape before they reach the database: 6 to 100
/// ASCII alphanumerics, dashes or underscores, starting with an alphanumeric.
pub fn is_valid_reference(reference: &str) -> bool {
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    (6..=100).contains(&reference.len()) &&
        reference.starts_with(|c: char| c.is_ascii_alphanumeric()) &&
        reference.chars().all(allowed)
}
