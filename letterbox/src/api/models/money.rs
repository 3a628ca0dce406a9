//! Money amounts in requests and responses.
//!
//! Amounts are stored as `NUMERIC(14,2)`. Requests must already be in whole cents, and responses
//! always carry exactly two decimal places (`"0.00"`, `"42.50"`).

use rust_decimal::Decimal;
use serde::{Serialize, Serializer};

use crate::errors::{Error, Result};

/// Decimal places of every stored amount
pub const CENT_SCALE: u32 = 2;

/// Rejects amounts with fractions of a cent
///
/// Trailing zeros do not count, so `"10.500"` is accepted as `10.50`.
pub fn require_cents(amount: Decimal) -> Result<Decimal> {
    if amount.normalize().scale() > CENT_SCALE {
        return Err(Error::bad_request("Amounts cannot have more than two decimal places"));
    }
    Ok(amount.round_dp(CENT_SCALE))
}

/// Same as [`require_cents`] for optional update fields
pub fn require_cents_opt(amount: Option<Decimal>) -> Result<Option<Decimal>> {
    amount.map(require_cents).transpose()
}

/// Amount with exactly two decimal places
pub fn to_cents_scale(amount: Decimal) -> Decimal {
    let mut amount = amount.round_dp(CENT_SCALE);
    amount.rescale(CENT_SCALE);
    amount
}

/// `serialize_with` helper for response money fields
pub fn serialize<S: Serializer>(amount: &Decimal, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    Serialize::serialize(&to_cents_scale(*amount), serializer)
}
