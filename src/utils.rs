//! Utility functions for identifiers and request codes

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique request id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Short human readable code such as `BR-3F9A0C1D`, taken from the sha256
/// digest of a fresh uuid7. Codes are not guaranteed unique; the store's
/// code index catches collisions.
pub fn new_request_code(prefix: &str, length: usize) -> String {
    let digest = sha256::digest(uuid7().as_bytes().to_vec());
    let length = length.clamp(4, digest.len());
    format!("{}-{}", prefix.trim().to_ascii_uppercase(), digest[..length].to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_codes_have_the_asked_shape() {
        let code = new_request_code("br", 8);
        let (prefix, body) = code.split_once('-').unwrap();

        assert_eq!(prefix, "BR");
        assert_eq!(body.len(), 8);
        assert!(body.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
        assert_eq!(new_request_code("BR", 1000).len(), 3 + 64);
    }

    #[test]
    fn ids_use_the_given_prefix() {
        let id = new_uuid_to_bech32("req").unwrap();
        assert!(id.starts_with("req1"));
        assert_ne!(id, new_uuid_to_bech32("req").unwrap());
    }
}
