//! Signed anti-forgery tokens for the public suggestion form.
//!
//! A token is a keyed SHA-256 over the action name and a time tick. A tick lasts
//! half the configured lifetime and verification accepts the current and the
//! previous tick, so a token stays valid for between half and the full lifetime.

use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub const FORM_SUBMIT_ACTION: &str = "my-places-form-submit";

const TOKEN_HEX_LEN: usize = 32;

#[derive(Clone)]
pub struct NonceSigner {
    secret: Vec<u8>,
    tick_secs: i64,
}

impl NonceSigner {
    pub fn new(secret: impl Into<Vec<u8>>, lifetime_secs: u64) -> Self {
        Self {
            secret: secret.into(),
            tick_secs: ((lifetime_secs / 2).max(1)) as i64,
        }
    }

    /// Signer with a random secret; its tokens do not survive a restart.
    pub fn random(lifetime_secs: u64) -> Self {
        let mut secret = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(secret, lifetime_secs)
    }

    fn tick_at(&self, unix_secs: i64) -> i64 {
        unix_secs.div_euclid(self.tick_secs) + 1
    }

    fn sign(&self, action: &str, tick: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update(b"|");
        hasher.update(action.as_bytes());
        hasher.update(b"|");
        hasher.update(tick.to_be_bytes());
        let digest = hex::encode(hasher.finalize());
        digest[..TOKEN_HEX_LEN].to_string()
    }

    pub fn create(&self, action: &str) -> String {
        self.create_at(action, Utc::now().timestamp())
    }

    pub fn create_at(&self, action: &str, unix_secs: i64) -> String {
        self.sign(action, self.tick_at(unix_secs))
    }

    pub fn verify(&self, token: &str, action: &str) -> bool {
        self.verify_at(token, action, Utc::now().timestamp())
    }

    pub fn verify_at(&self, token: &str, action: &str, unix_secs: i64) -> bool {
        if token.len() != TOKEN_HEX_LEN {
            return false;
        }
        let tick = self.tick_at(unix_secs);
        [tick, tick - 1]
            .iter()
            .any(|t| constant_time_eq(token.as_bytes(), self.sign(action, *t).as_bytes()))
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
