//! Anti-forgery tokens
//!
//! A bounded pool of single-use tokens. Issuing beyond capacity evicts the
//! oldest token; a successful validation consumes the token.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use clubguard_common::config::CsrfConfig;
use clubguard_common::error::Result;
use clubguard_common::metrics;

use crate::crypto::Encryptor;

/// Issues and validates CSRF tokens
pub struct CsrfTokenManager {
    capacity: usize,
    encryptor: Arc<Encryptor>,
    pool: Mutex<VecDeque<String>>,
}

impl CsrfTokenManager {
    pub fn new(config: &CsrfConfig, encryptor: Arc<Encryptor>) -> Self {
        let capacity = config.pool_capacity.max(1);
        Self {
            capacity,
            encryptor,
            pool: Mutex::new(VecDeque::with_capacity(capacity + 1)),
        }
    }

    /// Generate a new token and add it to the pool
    pub fn issue(&self) -> Result<String> {
        let token = self.encryptor.generate_token()?;

        let mut pool = self.pool.lock();
        pool.push_back(token.clone());
        while pool.len() > self.capacity {
            pool.pop_front();
        }
        debug!(outstanding = pool.len(), "CSRF token issued");

        Ok(token)
    }

    /// Consume `token` if it is outstanding
    pub fn validate(&self, token: &str) -> bool {
        let valid = {
            let mut pool = self.pool.lock();
            match pool.iter().position(|t| t == token) {
                Some(index) => {
                    pool.remove(index);
                    true
                }
                None => false,
            }
        };

        metrics::record_csrf_validation(valid);
        if !valid {
            warn!("Rejected unknown or already used CSRF token");
        }
        valid
    }

    /// Number of outstanding tokens
    pub fn len(&self) -> usize {
        self.pool.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.lock().is_empty()
    }
}
