use std::{
    sync::{Mutex, PoisonError},
    time::Duration,
};

use crate::{codec::decode_batch, Observation};

/// Delivers one encoded batch body.
pub trait Transport: core::fmt::Debug + Send + Sync + 'static {
    /// Blocking I/O
    ///
    /// Returns the response status. A non-success status is still a delivery.
    fn send(&self, body: &[u8]) -> anyhow::Result<u16>;
}

#[derive(Debug)]
pub struct HttpTransport {
    client: ureq::Agent,
    url: String,
}
impl HttpTransport {
    pub fn new(url: String, timeout: Duration) -> Self {
        let client = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { client, url }
    }
    pub fn url(&self) -> &str {
        &self.url
    }
}
impl Transport for HttpTransport {
    fn send(&self, body: &[u8]) -> anyhow::Result<u16> {
        let resp = self
            .client
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_bytes(body);
        match resp {
            Ok(resp) => Ok(resp.status()),
            Err(ureq::Error::Status(status, _)) => Ok(status),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps every delivered body in memory.
#[derive(Debug, Default)]
pub struct InMemTransport {
    bodies: Mutex<Vec<Vec<u8>>>,
}
impl InMemTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
    pub fn sends(&self) -> usize {
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
    /// Decoded `(key, observations)` of every delivered body, in delivery order.
    pub fn batches(&self) -> serde_json::Result<Vec<(String, Vec<Observation>)>> {
        self.bodies().iter().map(|body| decode_batch(body)).collect()
    }
}
impl Transport for InMemTransport {
    fn send(&self, body: &[u8]) -> anyhow::Result<u16> {
        self.bodies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(body.to_vec());
        Ok(200)
    }
}
