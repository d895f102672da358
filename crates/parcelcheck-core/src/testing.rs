//! Scripted in-process transport for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::identifier::CanonicalIdentifier;
use crate::transport::{LookupTransport, RawResponse};

type Reply = Result<RawResponse, TransportError>;

fn clone_reply(reply: &Reply) -> Reply {
    match reply {
        Ok(r) => Ok(r.clone()),
        Err(TransportError::Timeout { ms }) => Err(TransportError::Timeout { ms: *ms }),
        Err(TransportError::Http(m)) => Err(TransportError::Http(m.clone())),
        Err(TransportError::Other(m)) => Err(TransportError::Other(m.clone())),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Start(String),
    End(String),
}

/// Plays back scripted replies in order, then repeats the fallback.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Reply>>,
    fallback: Option<Reply>,
    delay: Duration,
    panic_on: Option<String>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    events: Mutex<Vec<Event>>,
}

impl ScriptedTransport {
    fn build(script: Vec<Reply>, fallback: Option<Reply>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            delay: Duration::ZERO,
            panic_on: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn always(reply: Reply) -> Self {
        Self::build(Vec::new(), Some(reply))
    }

    pub(crate) fn sequence(script: Vec<Reply>) -> Self {
        Self::build(script, None)
    }

    /// Hold every call for `delay` before replying.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Panic when asked to look up `phone`.
    pub(crate) fn panicking_on(mut self, phone: &str) -> Self {
        self.panic_on = Some(phone.to_string());
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl LookupTransport for ScriptedTransport {
    async fn call(
        &self,
        id: &CanonicalIdentifier,
        _timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on.as_deref() == Some(id.as_str()) {
            panic!("scripted panic for {id}");
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.events.lock().unwrap().push(Event::Start(id.to_string()));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.events.lock().unwrap().push(Event::End(id.to_string()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(reply) => reply,
            None => match &self.fallback {
                Some(reply) => clone_reply(reply),
                None => Err(TransportError::Other("script exhausted".into())),
            },
        }
    }

    fn url(&self) -> &str {
        "scripted"
    }
}
