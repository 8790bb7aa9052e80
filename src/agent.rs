use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::{Instant, MissedTickBehavior},
};
use tracing::warn;

use crate::{
    buf::BatchBuf,
    codec::encode_batch,
    error::RecordError,
    exporter::{HttpTransport, Transport},
    Observation, StatName, Time,
};

pub const DEFAULT_ENDPOINT: &str = "http://api.stathat.com/ez";

macro_rules! verbose {
    ($on:expr, $($arg:tt)+) => {
        if $on {
            tracing::info!($($arg)+);
        }
    };
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Opaque key naming the reporting destination
    pub account_key: String,
    pub endpoint: String,
    pub flush_interval: Duration,
    pub max_batch_size: usize,
    /// Slots in the ingestion queue between producers and the flush loop
    pub queue_capacity: usize,
    /// Upper bound on one HTTP delivery
    pub request_timeout: Duration,
    pub verbose: bool,
}
impl AgentConfig {
    pub fn new(account_key: impl Into<String>) -> Self {
        Self {
            account_key: account_key.into(),
            endpoint: DEFAULT_ENDPOINT.into(),
            flush_interval: Duration::from_secs(1),
            max_batch_size: 200,
            queue_capacity: 1000,
            request_timeout: Duration::from_secs(10),
            verbose: false,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.account_key.is_empty(), "account key is empty");
        anyhow::ensure!(self.max_batch_size > 0, "max batch size must be positive");
        anyhow::ensure!(self.queue_capacity > 0, "queue capacity must be positive");
        anyhow::ensure!(
            !self.flush_interval.is_zero(),
            "flush interval must be non-zero"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Running,
    Draining,
    Stopped,
}

/// Producer handle onto an agent's ingestion queue.
#[derive(Debug, Clone)]
pub struct Recorder {
    tx: mpsc::Sender<Observation>,
}
impl Recorder {
    /// Waits for a free slot if the queue is full.
    pub async fn record(&self, observation: Observation) -> Result<(), RecordError> {
        self.tx
            .send(observation)
            .await
            .map_err(|_| RecordError::Closed)
    }
    pub fn try_record(&self, observation: Observation) -> Result<(), RecordError> {
        self.tx.try_send(observation).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => RecordError::Saturated,
            mpsc::error::TrySendError::Closed(_) => RecordError::Closed,
        })
    }

    pub async fn record_counter(
        &self,
        name: impl Into<StatName>,
        delta: i64,
    ) -> Result<(), RecordError> {
        self.record(Observation::counter(name, delta)).await
    }
    pub async fn record_counter_at(
        &self,
        name: impl Into<StatName>,
        delta: i64,
        time: Time,
    ) -> Result<(), RecordError> {
        self.record(Observation::counter_at(name, delta, time)).await
    }
    pub async fn record_gauge(
        &self,
        name: impl Into<StatName>,
        value: f64,
    ) -> Result<(), RecordError> {
        self.record(Observation::gauge(name, value)).await
    }
    pub async fn record_gauge_at(
        &self,
        name: impl Into<StatName>,
        value: f64,
        time: Time,
    ) -> Result<(), RecordError> {
        self.record(Observation::gauge_at(name, value, time)).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Buffers observations and ships them in batches.
///
/// Dropping the agent without [`Agent::shutdown`] still flushes what is buffered, but nothing
/// waits for it.
#[derive(Debug)]
pub struct Agent {
    recorder: Recorder,
    shutdown: oneshot::Sender<()>,
    done: oneshot::Receiver<()>,
    state: watch::Receiver<AgentState>,
}
impl Agent {
    /// Delivers over HTTP to `config.endpoint`.
    ///
    /// Must be called within a tokio runtime.
    pub fn new(config: AgentConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config.endpoint.clone(), config.request_timeout);
        verbose!(config.verbose, url = transport.url(), "posting batches over http");
        Self::with_transport(config, Arc::new(transport))
    }

    pub fn with_transport(
        config: AgentConfig,
        transport: Arc<dyn Transport>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .context("agent must be created within a tokio runtime")?;

        let (tx, rx) = mpsc::channel(config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (done_tx, done_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(AgentState::Running);

        let flush_loop = FlushLoop {
            key: config.account_key,
            verbose: config.verbose,
            buf: BatchBuf::new(config.max_batch_size),
            body: vec![],
            transport,
            state: state_tx,
        };
        runtime.spawn(flush_loop.run(rx, shutdown_rx, done_tx, config.flush_interval));

        Ok(Self {
            recorder: Recorder { tx },
            shutdown: shutdown_tx,
            done: done_rx,
            state: state_rx,
        })
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }
    pub fn state(&self) -> AgentState {
        *self.state.borrow()
    }
    /// Follows the lifecycle past [`Agent::shutdown`] and drop.
    pub fn state_watch(&self) -> watch::Receiver<AgentState> {
        self.state.clone()
    }

    /// Flushes what is buffered or already queued and waits for the flush loop to stop.
    ///
    /// Any later submission through a [`Recorder`] fails with [`RecordError::Closed`].
    pub async fn shutdown(self) -> anyhow::Result<()> {
        let Self { shutdown, done, .. } = self;
        // fails only if the loop is already gone, which `done` reports
        let _ = shutdown.send(());
        done.await.context("flush loop exited without acknowledging shutdown")
    }
}

struct FlushLoop {
    key: String,
    verbose: bool,
    buf: BatchBuf,
    /// Reused across flushes
    body: Vec<u8>,
    transport: Arc<dyn Transport>,
    state: watch::Sender<AgentState>,
}
impl FlushLoop {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<Observation>,
        mut shutdown: oneshot::Receiver<()>,
        done: oneshot::Sender<()>,
        interval: Duration,
    ) {
        let mut tick = tokio::time::interval_at(Instant::now() + interval, interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                observation = rx.recv() => {
                    let Some(observation) = observation else {
                        break;
                    };
                    self.push(observation).await;
                }
                _ = tick.tick() => {
                    if self.buf.is_empty() {
                        verbose!(self.verbose, "interval reached, nothing to send");
                    } else {
                        verbose!(self.verbose, "interval reached, flushing");
                        self.flush().await;
                    }
                }
                // a dropped agent counts as a shutdown request
                _ = &mut shutdown => break,
            }
        }

        self.state.send_replace(AgentState::Draining);
        verbose!(self.verbose, buffered = self.buf.len(), "exit requested, flushing");
        // reject new submissions before draining so each accepted one is flushed below
        rx.close();
        while let Some(observation) = rx.recv().await {
            self.push(observation).await;
        }
        if self.buf.is_empty() {
            verbose!(self.verbose, "nothing left to send");
        } else {
            self.flush().await;
        }

        self.state.send_replace(AgentState::Stopped);
        verbose!(self.verbose, "exit");
        let _ = done.send(());
    }

    async fn push(&mut self, observation: Observation) {
        verbose!(
            self.verbose,
            len = self.buf.len(),
            max = self.buf.max_size(),
            ?observation,
            "buffer"
        );
        if self.buf.push(observation) {
            verbose!(
                self.verbose,
                "exceeded {} messages, flushing",
                self.buf.max_size()
            );
            self.flush().await;
        }
    }

    /// Sends the buffer as one batch and clears it, whatever the outcome.
    async fn flush(&mut self) {
        let len = self.buf.len();
        let encoded = encode_batch(&mut self.body, &self.key, self.buf.as_slice());
        self.buf.clear();
        if let Err(e) = encoded {
            warn!(error = %e, observations = len, "dropping batch that failed to encode");
            return;
        }

        let body = std::mem::take(&mut self.body);
        let transport = Arc::clone(&self.transport);
        let sent = tokio::task::spawn_blocking(move || {
            let resp = transport.send(&body);
            (body, resp)
        })
        .await;
        match sent {
            Ok((body, resp)) => {
                self.body = body;
                match resp {
                    Ok(status) => {
                        verbose!(self.verbose, status, observations = len, "response")
                    }
                    Err(e) => {
                        warn!(error = %e, observations = len, "failed to deliver batch")
                    }
                }
            }
            Err(e) => warn!(error = %e, observations = len, "transport task failed"),
        }
    }
}
