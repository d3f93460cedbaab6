//! One dispatch cycle: forecast, summary and message for every subscriber.
//!
//! Subscribers are independent. Whatever goes wrong for one of them is
//! recorded in its outcome and the batch moves on. Nothing is retried here
//! and nothing is deduplicated; the external scheduler re-runs whole batches.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use thiserror::Error;
use wxbot_core::DispatchConfig;
use wxbot_weather::{summarize, FetchError, ForecastDay, ForecastSource, SummaryError};

use crate::store::{StoreError, SubscriberStore};
use crate::subscriber::{bare_phone, Subscriber};
use crate::transport::{Ack, MessageTransport, SendError, SendErrorKind};

/// Flat error category for logs and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Fetch,
    NoForecastForDate,
    EmptyComposition,
    Send,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::NoForecastForDate => "no_forecast_for_date",
            Self::EmptyComposition => "empty_composition",
            Self::Send => "send",
            Self::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Forecast fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Summary(#[from] SummaryError),

    #[error(transparent)]
    Send(#[from] SendError),
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(FetchError::Timeout) => ErrorKind::Timeout,
            Self::Send(SendError {
                kind: SendErrorKind::Timeout,
                ..
            }) => ErrorKind::Timeout,
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::Summary(SummaryError::NoForecastForDate(_)) => ErrorKind::NoForecastForDate,
            Self::Summary(SummaryError::EmptyComposition) => ErrorKind::EmptyComposition,
            Self::Send(_) => ErrorKind::Send,
        }
    }
}

/// Result of one subscriber's dispatch; logged, never stored.
#[derive(Debug)]
pub struct DispatchOutcome {
    pub subscriber_id: i64,
    pub recipient: String,
    pub result: Result<Ack, DispatchError>,
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.result.as_ref().err().map(DispatchError::kind)
    }
}

/// Outcomes of one batch, in subscriber order
#[derive(Debug)]
pub struct BatchReport {
    pub day: ForecastDay,
    pub outcomes: Vec<DispatchOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

pub struct Dispatcher {
    source: Arc<dyn ForecastSource>,
    transport: Arc<dyn MessageTransport>,
    call_timeout: Duration,
    max_concurrency: usize,
    only_recipients: Vec<String>,
}

impl Dispatcher {
    pub fn new(
        source: Arc<dyn ForecastSource>,
        transport: Arc<dyn MessageTransport>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            source,
            transport,
            call_timeout: config.call_timeout(),
            max_concurrency: config.max_concurrency.max(1),
            only_recipients: config
                .only_recipients
                .iter()
                .map(|p| bare_phone(p).to_string())
                .collect(),
        }
    }

    /// Read the subscriber snapshot from `store` and run a batch.
    ///
    /// Failing to list subscribers is the only error that aborts a batch.
    pub async fn run_from_store(
        &self,
        store: &dyn SubscriberStore,
        day: ForecastDay,
    ) -> Result<BatchReport, StoreError> {
        self.run_from_store_at(store, day, Utc::now()).await
    }

    /// `run_from_store` as if the current time were `now`.
    pub async fn run_from_store_at(
        &self,
        store: &dyn SubscriberStore,
        day: ForecastDay,
        now: DateTime<Utc>,
    ) -> Result<BatchReport, StoreError> {
        let subscribers = store.list_all()?;
        tracing::info!("Loaded {} subscribers", subscribers.len());
        Ok(self.run_at(&subscribers, day, now).await)
    }

    pub async fn run(&self, subscribers: &[Subscriber], day: ForecastDay) -> BatchReport {
        self.run_at(subscribers, day, Utc::now()).await
    }

    /// Run a batch as if the current time were `now`.
    pub async fn run_at(
        &self,
        subscribers: &[Subscriber],
        day: ForecastDay,
        now: DateTime<Utc>,
    ) -> BatchReport {
        let selected: Vec<&Subscriber> = subscribers.iter().filter(|s| self.is_selected(s)).collect();
        if selected.len() < subscribers.len() {
            tracing::info!(
                "Recipient filter active: {} of {} subscribers selected",
                selected.len(),
                subscribers.len()
            );
        }

        let outcomes: Vec<DispatchOutcome> = stream::iter(selected)
            .map(|subscriber| self.dispatch_one(subscriber, day, now))
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let report = BatchReport { day, outcomes };
        tracing::info!(
            day = %day,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Dispatch batch finished"
        );
        report
    }

    fn is_selected(&self, subscriber: &Subscriber) -> bool {
        self.only_recipients.is_empty()
            || self
                .only_recipients
                .iter()
                .any(|p| p == bare_phone(&subscriber.phone_number))
    }

    async fn dispatch_one(
        &self,
        subscriber: &Subscriber,
        day: ForecastDay,
        now: DateTime<Utc>,
    ) -> DispatchOutcome {
        let recipient = subscriber.recipient();
        let result = self.deliver(subscriber, &recipient, day, now).await;

        match &result {
            Ok(ack) => tracing::info!(
                subscriber = subscriber.id,
                recipient = %recipient,
                message_id = %ack.message_id,
                "Forecast sent"
            ),
            Err(e) => tracing::warn!(
                subscriber = subscriber.id,
                recipient = %recipient,
                kind = %e.kind(),
                error = %e,
                "Dispatch failed"
            ),
        }

        DispatchOutcome {
            subscriber_id: subscriber.id,
            recipient,
            result,
        }
    }

    async fn deliver(
        &self,
        subscriber: &Subscriber,
        recipient: &str,
        day: ForecastDay,
        now: DateTime<Utc>,
    ) -> Result<Ack, DispatchError> {
        let points = tokio::time::timeout(
            self.call_timeout,
            self.source.fetch(subscriber.longitude, subscriber.latitude),
        )
        .await
        .map_err(|_| FetchError::Timeout)??;

        let message = summarize(&points, &subscriber.location, day, now)?;

        let ack = tokio::time::timeout(self.call_timeout, self.transport.send(recipient, &message))
            .await
            .map_err(|_| SendError::new(recipient, &message, SendErrorKind::Timeout))??;

        Ok(ack)
    }
}
