use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds half away from zero and pins the scale so `0` renders as `0.00`.
pub(crate) fn two_dp(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}
