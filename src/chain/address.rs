use alloy_primitives::Address;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("not an address: {0:?}")]
    InvalidFormat(String),
    #[error("bad address checksum: {0}")]
    BadChecksum(String),
}

/// Parses user-supplied address text: an optional `0x` prefix followed by 40
/// hex digits. All-lower and all-upper inputs are taken as is; mixed-case
/// inputs must carry a valid EIP-55 checksum.
pub fn parse_address(input: &str) -> Result<Address, AddressError> {
    let address: Address = input
        .parse()
        .map_err(|_| AddressError::InvalidFormat(input.to_string()))?;
    let digits = input.strip_prefix("0x").unwrap_or(input);
    let mixed_case = digits.bytes().any(|b| b.is_ascii_lowercase())
        && digits.bytes().any(|b| b.is_ascii_uppercase());
    if mixed_case {
        return Address::parse_checksummed(input, None)
            .map_err(|_| AddressError::BadChecksum(input.to_string()));
    }
    Ok(address)
}

/// `0x1234...abcd` form used in the connection status line.
pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
