//! AES-GCM primitives for BCB confidentiality.
//!
//! Encryption is in place with a detached 16-byte tag: the ciphertext has
//! the same length as the plaintext, and the IV and tag travel in the BCB's
//! parameters and results.

use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadCore, AeadInPlace, KeyInit};
use aes_gcm::aes::{Aes128, Aes256};
use aes_gcm::AesGcm;

use super::error::CryptoError;
use super::params::AesVariant;

/// Detached authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypts `data` in place and returns the detached tag.
///
/// # Errors
///
/// Returns [`CryptoError::KeyLength`] when the key does not match the
/// variant and [`CryptoError::UnsupportedIvLength`] for IV lengths other
/// than 12 or 16 bytes.
pub fn encrypt_in_place(
    variant: AesVariant,
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    data: &mut [u8],
) -> Result<[u8; TAG_LEN], CryptoError> {
    check_key(variant, key)?;
    match (variant, iv.len()) {
        (AesVariant::A128, 12) => seal::<AesGcm<Aes128, U12>>(key, iv, aad, data),
        (AesVariant::A128, 16) => seal::<AesGcm<Aes128, U16>>(key, iv, aad, data),
        (AesVariant::A256, 12) => seal::<AesGcm<Aes256, U12>>(key, iv, aad, data),
        (AesVariant::A256, 16) => seal::<AesGcm<Aes256, U16>>(key, iv, aad, data),
        (_, len) => Err(CryptoError::UnsupportedIvLength { len }),
    }
}

/// Decrypts `data` in place, verifying the detached tag and AAD.
///
/// # Errors
///
/// Any tag or AAD mismatch yields [`CryptoError::AuthFail`] with no further
/// distinction. Key and IV shape problems surface as the misconfiguration
/// variants.
pub fn decrypt_in_place(
    variant: AesVariant,
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    data: &mut [u8],
    tag: &[u8],
) -> Result<(), CryptoError> {
    check_key(variant, key)?;
    if tag.len() != TAG_LEN {
        return Err(CryptoError::AuthFail);
    }
    match (variant, iv.len()) {
        (AesVariant::A128, 12) => open::<AesGcm<Aes128, U12>>(key, iv, aad, data, tag),
        (AesVariant::A128, 16) => open::<AesGcm<Aes128, U16>>(key, iv, aad, data, tag),
        (AesVariant::A256, 12) => open::<AesGcm<Aes256, U12>>(key, iv, aad, data, tag),
        (AesVariant::A256, 16) => open::<AesGcm<Aes256, U16>>(key, iv, aad, data, tag),
        (_, len) => Err(CryptoError::UnsupportedIvLength { len }),
    }
}

fn check_key(variant: AesVariant, key: &[u8]) -> Result<(), CryptoError> {
    if key.len() == variant.key_len() {
        Ok(())
    } else {
        Err(CryptoError::KeyLength {
            expected: variant.key_len(),
            actual: key.len(),
        })
    }
}

fn seal<C>(key: &[u8], iv: &[u8], aad: &[u8], data: &mut [u8]) -> Result<[u8; TAG_LEN], CryptoError>
where
    C: AeadInPlace + AeadCore<TagSize = U16> + KeyInit,
{
    let cipher = C::new_from_slice(key).map_err(|_| CryptoError::KeyLength {
        expected: key.len(),
        actual: key.len(),
    })?;
    let nonce = GenericArray::from_slice(iv);
    let tag = cipher
        .encrypt_in_place_detached(nonce, aad, data)
        .map_err(|_| CryptoError::AuthFail)?;
    Ok(tag.into())
}

fn open<C>(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    data: &mut [u8],
    tag: &[u8],
) -> Result<(), CryptoError>
where
    C: AeadInPlace + AeadCore<TagSize = U16> + KeyInit,
{
    let cipher = C::new_from_slice(key).map_err(|_| CryptoError::KeyLength {
        expected: key.len(),
        actual: key.len(),
    })?;
    let nonce = GenericArray::from_slice(iv);
    cipher
        .decrypt_in_place_detached(nonce, aad, data, GenericArray::from_slice(tag))
        .map_err(|_| CryptoError::AuthFail)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY256: [u8; 32] = [0x42; 32];
    const IV12: [u8; 12] = [0x07; 12];

    #[test]
    fn encrypt_then_decrypt_restores_plaintext() {
        let mut data = b"payload bytes".to_vec();
        let tag = encrypt_in_place(AesVariant::A256, &KEY256, &IV12, b"aad", &mut data).unwrap();
        assert_ne!(data, b"payload bytes");
        assert_eq!(data.len(), b"payload bytes".len());

        decrypt_in_place(AesVariant::A256, &KEY256, &IV12, b"aad", &mut data, &tag).unwrap();
        assert_eq!(data, b"payload bytes");
    }

    #[test]
    fn wrong_key_aad_or_tag_fail_identically() {
        let mut data = b"payload bytes".to_vec();
        let tag = encrypt_in_place(AesVariant::A256, &KEY256, &IV12, b"aad", &mut data).unwrap();

        let mut c = data.clone();
        let wrong_key = [0x43; 32];
        assert_eq!(
            decrypt_in_place(AesVariant::A256, &wrong_key, &IV12, b"aad", &mut c, &tag),
            Err(CryptoError::AuthFail)
        );

        let mut c = data.clone();
        assert_eq!(
            decrypt_in_place(AesVariant::A256, &KEY256, &IV12, b"AAD", &mut c, &tag),
            Err(CryptoError::AuthFail)
        );

        let mut c = data.clone();
        let mut bad_tag = tag;
        bad_tag[0] ^= 1;
        assert_eq!(
            decrypt_in_place(AesVariant::A256, &KEY256, &IV12, b"aad", &mut c, &bad_tag),
            Err(CryptoError::AuthFail)
        );
    }

    #[test]
    fn key_and_iv_shape_errors_are_misconfigurations() {
        let mut data = vec![0u8; 4];
        let err =
            encrypt_in_place(AesVariant::A256, &[0u8; 16], &IV12, b"", &mut data).unwrap_err();
        assert!(err.is_misconfiguration());

        let err =
            encrypt_in_place(AesVariant::A256, &KEY256, &[0u8; 7], b"", &mut data).unwrap_err();
        assert_eq!(err, CryptoError::UnsupportedIvLength { len: 7 });
    }

    #[test]
    fn sixteen_byte_ivs_are_supported() {
        let iv = [0x11; 16];
        let mut data = b"x".to_vec();
        let tag = encrypt_in_place(AesVariant::A128, &[1; 16], &iv, b"", &mut data).unwrap();
        decrypt_in_place(AesVariant::A128, &[1; 16], &iv, b"", &mut data, &tag).unwrap();
        assert_eq!(data, b"x");
    }
}
