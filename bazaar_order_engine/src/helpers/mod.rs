mod reference;

pub use reference::{is_valid_reference, new_payment_reference, REFERENCE_SUFFIX_LENGTH};
