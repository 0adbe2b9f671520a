use alloy_primitives::{utils::format_ether, U256};

pub const WEI_PER_ETHER: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Ether rendering the page shows: `50000000000000000` -> `0.05`; whole
/// amounts keep one fractional digit (`1.0`).
pub fn display_ether(amount: U256) -> String {
    let full = format_ether(amount);
    match full.split_once('.') {
        Some((whole, frac)) => {
            let frac = frac.trim_end_matches('0');
            if frac.is_empty() {
                format!("{whole}.0")
            } else {
                format!("{whole}.{frac}")
            }
        }
        None => format!("{full}.0"),
    }
}
