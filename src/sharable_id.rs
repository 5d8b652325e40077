//! Reversible encoding of Plaid account ids into ids that can be shared with clients.
//!
//! A sharable id is `base64url(nonce || ciphertext)` of the account id under
//! deterministic XChaCha20-Poly1305. The same key always maps the same account id
//! to the same sharable id, so the key has to come from configuration and stay
//! stable across restarts.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chacha20poly1305::Key;

use crate::db::{AccountId, Cipher as _, SharableId, XChaCha20Poly1305Cipher};
use crate::error::{LinkError, LinkResult};

#[derive(Clone)]
pub struct SharableIdCodec {
    cipher: XChaCha20Poly1305Cipher,
}

impl SharableIdCodec {
    pub fn with_key(key: &Key) -> Self {
        Self {
            cipher: XChaCha20Poly1305Cipher::with_key(key),
        }
    }

    pub fn encode(&self, account_id: &AccountId) -> LinkResult<SharableId> {
        let ciphertext = self
            .cipher
            .encrypt_deterministic(account_id.0.as_bytes())
            .map_err(|err| LinkError::Encoding(err.to_string()))?;
        Ok(SharableId(URL_SAFE_NO_PAD.encode(ciphertext)))
    }

    pub fn decode(&self, sharable_id: &SharableId) -> LinkResult<AccountId> {
        let ciphertext = URL_SAFE_NO_PAD
            .decode(sharable_id.0.trim())
            .map_err(|err| LinkError::Encoding(err.to_string()))?;
        let plaintext = self
            .cipher
            .decrypt_deterministic(&ciphertext)
            .map_err(|err| LinkError::Encoding(err.to_string()))?;
        let account_id =
            String::from_utf8(plaintext).map_err(|err| LinkError::Encoding(err.to_string()))?;
        Ok(AccountId(account_id))
    }
}

#[cfg(test)]
mod tests {
    use common_macros::hash_set;
    use rstest::rstest;

    use super::*;
    use crate::db::key_from_slice;

    fn codec(seed: u8) -> SharableIdCodec {
        SharableIdCodec::with_key(&key_from_slice(&[seed; 32]).unwrap())
    }

    #[rstest]
    #[case("acct-1")]
    #[case("")]
    #[case("BxBXxLj1m4HMXBm9WZZmCWVbPjX16EHwv99vp")]
    #[case("konto-überweisung-€")]
    #[case("with spaces / slashes + pluses=")]
    fn decode_recovers_encoded_account_id(#[case] account_id: &str) {
        let codec = codec(1);
        let account_id = AccountId(account_id.to_string());
        let sharable_id = codec.encode(&account_id).unwrap();
        assert_eq!(account_id, codec.decode(&sharable_id).unwrap());
    }

    #[test]
    fn encoding_is_deterministic_across_instances() {
        let account_id = AccountId("acct-1".to_string());
        assert_eq!(
            codec(1).encode(&account_id).unwrap(),
            codec(1).encode(&account_id).unwrap()
        );
    }

    #[test]
    fn different_accounts_get_different_ids() {
        let codec = codec(1);
        let encode = |account_id: &str| codec.encode(&AccountId(account_id.to_string())).unwrap();
        let ids = hash_set! {
            encode("acct-1"),
            encode("acct-2"),
            encode("acct-10"),
        };
        assert_eq!(3, ids.len());
    }

    #[test]
    fn sharable_id_does_not_contain_account_id() {
        let sharable_id = codec(1).encode(&AccountId("acct-1".to_string())).unwrap();
        assert!(!sharable_id.0.contains("acct-1"));
    }

    #[test]
    fn sharable_id_is_url_safe() {
        let sharable_id = codec(1)
            .encode(&AccountId("some-longer-account-id-to-get-all-symbols".to_string()))
            .unwrap();
        assert!(sharable_id
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn decode_with_other_key_fails() {
        let sharable_id = codec(1).encode(&AccountId("acct-1".to_string())).unwrap();
        let error = codec(2).decode(&sharable_id).unwrap_err();
        assert!(matches!(error, LinkError::Encoding(_)));
    }

    #[rstest]
    #[case("")]
    #[case("not base64!")]
    #[case("YWNjdC0x")]
    fn decode_rejects_garbage(#[case] sharable_id: &str) {
        let error = codec(1)
            .decode(&SharableId(sharable_id.to_string()))
            .unwrap_err();
        assert!(matches!(error, LinkError::Encoding(_)));
    }
}
