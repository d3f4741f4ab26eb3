use des::cipher::generic_array::GenericArray;
use des::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use des::Des;

pub const CRYPT_BLOCK_BYTES: usize = 8;

/// Credential-block cipher for the login exchange: DES in CBC mode with an
/// all-zero key and all-zero IV, which is what the Titanium login server
/// expects. Inputs are zero-padded to a multiple of the block size.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoginCipher;

impl LoginCipher {
    pub fn encrypt_padded(&self, data: &[u8]) -> Vec<u8> {
        let mut buf = data.to_vec();
        let padding = (CRYPT_BLOCK_BYTES - (buf.len() % CRYPT_BLOCK_BYTES)) % CRYPT_BLOCK_BYTES;
        buf.extend(std::iter::repeat(0u8).take(padding));

        let cipher = zero_key_cipher();
        let mut chain = [0u8; CRYPT_BLOCK_BYTES];
        for chunk in buf.chunks_exact_mut(CRYPT_BLOCK_BYTES) {
            for (byte, prev) in chunk.iter_mut().zip(chain.iter()) {
                *byte ^= prev;
            }
            cipher.encrypt_block(GenericArray::from_mut_slice(chunk));
            chain.copy_from_slice(chunk);
        }
        buf
    }

    pub fn decrypt_to_vec(&self, data: &[u8]) -> Result<Vec<u8>, String> {
        if data.len() % CRYPT_BLOCK_BYTES != 0 {
            return Err("des decrypt length is not a multiple of 8".to_string());
        }
        let cipher = zero_key_cipher();
        let mut buf = data.to_vec();
        let mut chain = [0u8; CRYPT_BLOCK_BYTES];
        for chunk in buf.chunks_exact_mut(CRYPT_BLOCK_BYTES) {
            let mut next_chain = [0u8; CRYPT_BLOCK_BYTES];
            next_chain.copy_from_slice(chunk);
            cipher.decrypt_block(GenericArray::from_mut_slice(chunk));
            for (byte, prev) in chunk.iter_mut().zip(chain.iter()) {
                *byte ^= prev;
            }
            chain = next_chain;
        }
        Ok(buf)
    }

    /// Username and password as two null-terminated strings packed
    /// end-to-end, padded and encrypted.
    pub fn encrypt_credentials(&self, user: &str, pass: &str) -> Vec<u8> {
        let mut plain = Vec::with_capacity(user.len() + pass.len() + 2);
        plain.extend_from_slice(user.as_bytes());
        plain.push(0);
        plain.extend_from_slice(pass.as_bytes());
        plain.push(0);
        self.encrypt_padded(&plain)
    }
}

fn zero_key_cipher() -> Des {
    Des::new(GenericArray::from_slice(&[0u8; CRYPT_BLOCK_BYTES]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_preserves_payload_with_padding() {
        let cipher = LoginCipher;
        let payload = b"user\0password\0";
        let encrypted = cipher.encrypt_padded(payload);
        assert_eq!(encrypted.len() % CRYPT_BLOCK_BYTES, 0);
        assert_ne!(&encrypted[..payload.len()], payload);
        let decrypted = cipher.decrypt_to_vec(&encrypted).expect("decrypt");
        assert_eq!(&decrypted[..payload.len()], payload);
        for byte in &decrypted[payload.len()..] {
            assert_eq!(*byte, 0);
        }
    }

    #[test]
    fn roundtrip_exact_block() {
        let cipher = LoginCipher;
        let payload = b"12345678";
        let encrypted = cipher.encrypt_padded(payload);
        assert_eq!(encrypted.len(), payload.len());
        let decrypted = cipher.decrypt_to_vec(&encrypted).expect("decrypt");
        assert_eq!(decrypted, payload);
    }

    #[test]
    fn decrypt_rejects_ragged_length() {
        let cipher = LoginCipher;
        assert!(cipher.decrypt_to_vec(&[0u8; 9]).is_err());
    }

    #[test]
    fn credentials_block_layout() {
        let cipher = LoginCipher;
        let block = cipher.encrypt_credentials("quser", "qpass");
        // 5 + 1 + 5 + 1 = 12 bytes, padded to 16
        assert_eq!(block.len(), 16);
        let plain = cipher.decrypt_to_vec(&block).expect("decrypt");
        assert_eq!(&plain[..6], b"quser\0");
        assert_eq!(&plain[6..12], b"qpass\0");
    }

    #[test]
    fn cbc_chains_across_blocks() {
        let cipher = LoginCipher;
        let repeated = [0x41u8; 16];
        let encrypted = cipher.encrypt_padded(&repeated);
        // identical plaintext blocks must not encrypt identically under CBC
        assert_ne!(&encrypted[..8], &encrypted[8..16]);
    }
}
