//! HMAC-SHA2 primitives for BIB integrity.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

use super::error::CryptoError;
use super::params::ShaVariant;

/// Computes the HMAC of the IPPT under the selected SHA-2 variant.
///
/// HMAC accepts keys of any length, so this cannot fail.
#[must_use]
pub fn compute(variant: ShaVariant, key: &[u8], ippt: &[u8]) -> Vec<u8> {
    match variant {
        ShaVariant::Sha256 => {
            let mut mac = Hmac::<Sha256>::new_from_slice(key)
                .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
            mac.update(ippt);
            mac.finalize().into_bytes().to_vec()
        }
        ShaVariant::Sha384 => {
            let mut mac = Hmac::<Sha384>::new_from_slice(key)
                .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
            mac.update(ippt);
            mac.finalize().into_bytes().to_vec()
        }
        ShaVariant::Sha512 => {
            let mut mac = Hmac::<Sha512>::new_from_slice(key)
                .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
            mac.update(ippt);
            mac.finalize().into_bytes().to_vec()
        }
    }
}

/// Verifies an expected HMAC in constant time.
///
/// # Errors
///
/// Returns [`CryptoError::AuthFail`] on any mismatch, including a wrong
/// digest length.
pub fn verify(
    variant: ShaVariant,
    key: &[u8],
    ippt: &[u8],
    expected: &[u8],
) -> Result<(), CryptoError> {
    let computed = compute(variant, key, ippt);
    if bool::from(computed.as_slice().ct_eq(expected)) {
        Ok(())
    } else {
        Err(CryptoError::AuthFail)
    }
}
