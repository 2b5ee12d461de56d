//! Recording fakes for the provider seams, shared by unit and integration
//! tests across the workspace. Never constructed in production paths.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use sanctuary_types::domain::DeliveryStatus;

use crate::error::{Error, Result};
use crate::gateway::{Notifier, SendOutcome, SmsGateway};

/// Gateway fake: records every send, hands back sequential provider ids,
/// and fails on request for configured numbers.
#[derive(Default)]
pub struct FakeGateway {
    pub sent: Mutex<Vec<(String, String)>>,
    fail_numbers: Mutex<HashSet<String>>,
    counter: AtomicU64,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future send to `number` fail.
    pub fn fail_for(&self, number: &str) {
        self.fail_numbers.lock().unwrap().insert(number.to_string());
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(to, _)| to.clone())
            .collect()
    }

    pub fn last_body(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, body)| body.clone())
    }
}

#[async_trait]
impl SmsGateway for FakeGateway {
    async fn send(&self, to: &str, body: &str) -> Result<SendOutcome> {
        if self.fail_numbers.lock().unwrap().contains(to) {
            return Err(Error::dependency(format!("gateway refused {to}")));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        Ok(SendOutcome {
            provider_id: format!("SMfake{n:06}"),
            initial_status: DeliveryStatus::Sent,
        })
    }
}

/// Notifier fake: records posts and mints deterministic thread refs.
#[derive(Default)]
pub struct FakeNotifier {
    pub posts: Mutex<Vec<(String, Option<String>)>>,
    fail: AtomicBool,
    counter: AtomicU64,
}

impl FakeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_all(&self) {
        self.fail.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl Notifier for FakeNotifier {
    async fn post(&self, text: &str, thread_ref: Option<&str>) -> Result<String> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Error::dependency("notifier unavailable"));
        }
        self.posts
            .lock()
            .unwrap()
            .push((text.to_string(), thread_ref.map(String::from)));
        match thread_ref {
            Some(existing) => Ok(existing.to_string()),
            None => {
                let n = self.counter.fetch_add(1, Ordering::Relaxed);
                Ok(format!("thread-{n}"))
            }
        }
    }
}
