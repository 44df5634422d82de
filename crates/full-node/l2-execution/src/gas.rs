use std::cmp::Ordering;

/// Bound divisor of the gas limit, used in update calculations.
pub const GAS_LIMIT_BOUND_DIVISOR: u64 = 1024;

/// Minimum the gas limit may ever be.
pub const MIN_GAS_LIMIT: u64 = 5000;

/// Computes the gas limit of the next block after `parent_gas_limit`.
///
/// The limit moves towards `desired_limit` by at most `parent / 1024 - 1` per
/// block. A decreasing limit stops at [`MIN_GAS_LIMIT`].
pub fn calc_gas_limit(parent_gas_limit: u64, desired_limit: u64) -> u64 {
    let delta = (parent_gas_limit / GAS_LIMIT_BOUND_DIVISOR).saturating_sub(1);
    let desired_limit = desired_limit.max(MIN_GAS_LIMIT);
    match parent_gas_limit.cmp(&desired_limit) {
        Ordering::Less => parent_gas_limit.saturating_add(delta).min(desired_limit),
        Ordering::Greater => parent_gas_limit.saturating_sub(delta).max(desired_limit),
        Ordering::Equal => parent_gas_limit,
    }
}
