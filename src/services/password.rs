//! Salted password hashes stored as `hex(hash).hex(salt)`.

use sha2::{Digest, Sha256};

const SALT_LEN: usize = 16;
const ROUNDS: u32 = 10_000;

fn derive(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut digest: [u8; 32] = Sha256::new()
        .chain_update(salt)
        .chain_update(password.as_bytes())
        .finalize()
        .into();

    for _ in 1..ROUNDS {
        digest = Sha256::new()
            .chain_update(salt)
            .chain_update(digest)
            .finalize()
            .into();
    }

    digest
}

pub(crate) fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn hash_password(password: &str) -> String {
    let salt: [u8; SALT_LEN] = rand::random();
    format!("{}.{}", hex::encode(derive(password, &salt)), hex::encode(salt))
}

pub fn verify_password(supplied: &str, stored: &str) -> bool {
    let Some((hash, salt)) = stored.split_once('.') else {
        return false;
    };
    let (Ok(expected), Ok(salt)) = (hex::decode(hash), hex::decode(salt)) else {
        return false;
    };

    constant_time_eq(&derive(supplied, &salt), &expected)
}
