//! xdg_activation_v1 tokens
//!
//! Tokens are opaque strings handed to clients on commit of an activation
//! token object. A token activates at most once.

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Issued, not yet used activation tokens
#[derive(Debug)]
pub struct ActivationTokens {
    issued: HashSet<String>,
    counter: u64,
    seed: u64,
}

impl ActivationTokens {
    pub fn new() -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self {
            issued: HashSet::new(),
            counter: 0,
            seed,
        }
    }

    /// Issue a fresh token
    pub fn issue(&mut self) -> String {
        self.counter += 1;
        let token = format!("casilda-{:016x}-{}", self.seed, self.counter);
        self.issued.insert(token.clone());
        token
    }

    /// Consume a token, returning whether it was valid
    pub fn consume(&mut self, token: &str) -> bool {
        self.issued.remove(token)
    }

    pub fn len(&self) -> usize {
        self.issued.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issued.is_empty()
    }
}

impl Default for ActivationTokens {
    fn default() -> Self {
        Self::new()
    }
}
