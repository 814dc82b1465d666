// Paged extraction of one tag's history
//
// A session is a `SessionState` threaded through transitions:
//   start -> fetch -> apply (merge + decide) -> fetch ... -> SessionReport
// `start` and `apply` are pure; only `SyncSession::fetch` touches the network.

use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::client::retry::RetryPolicy;
use crate::client::transport::HistoryTransport;
use crate::core::codec::TimestampCodec;
use crate::core::constants::DEFAULT_TIMEOUT_SECS;
use crate::core::error::{FetchError, PimsError, Result, TransportError};
use crate::core::format::{Credentials, PimsTimestamp, PimsWindow, Sample, TagRequest, TagSeries, TimeWindow};
use crate::core::query::{check_quotable, QueryBuilder};
use crate::core::response::{parse_history, ParsedPage};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Complete,
    PartialDueToError(FetchError),
    EmptyWindow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A page reached the requested stop time.
    ReachedStop,
    /// The server reported no more data after at least one page.
    EndOfData,
    /// A page made no forward progress.
    Stagnated,
    /// The current page was dropped on a transport or parse failure.
    Failed,
    /// The first page was already empty.
    NoData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub series: TagSeries,
    pub outcome: Outcome,
    pub stop: StopReason,
    /// Page requests issued, retries excluded.
    pub calls: usize,
    /// Pages merged into `series`.
    pub pages: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub tag: String,
    pub data_source: String,
    /// Lower bound advances past each merged page; `stop` never changes.
    pub window: PimsWindow,
    pub series: TagSeries,
    pub last_emitted: Option<PimsTimestamp>,
    pub needs_next_call: bool,
    pub calls: usize,
    pub pages: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Next(SessionState),
    Finished(SessionReport),
}

impl SessionState {
    pub fn start(
        request: &TagRequest,
        data_source: &str,
        window: &TimeWindow,
        codec: &TimestampCodec,
    ) -> Result<Self> {
        if request.tag.trim().is_empty() {
            return Err(PimsError::EmptyTag);
        }
        check_quotable("tag", &request.tag)?;
        check_quotable("data source", data_source)?;
        window.validate()?;

        Ok(Self {
            tag: request.tag.clone(),
            data_source: data_source.to_string(),
            window: codec.encode_window(window),
            series: TagSeries::new(request.tag.clone(), request.display_name()),
            last_emitted: None,
            needs_next_call: true,
            calls: 0,
            pages: 0,
        })
    }

    /// Consumes the result of one page request.
    pub fn apply(
        mut self,
        page: std::result::Result<ParsedPage, FetchError>,
        codec: &TimestampCodec,
    ) -> Transition {
        self.calls += 1;
        match page {
            Ok(ParsedPage::Samples(samples)) => self.merge(samples, codec),
            Ok(ParsedPage::NoData { notice }) => {
                if let Some(notice) = notice {
                    debug!("server notice on call {}: {:?}", self.calls, notice);
                }
                Transition::Finished(self.no_data())
            }
            Err(e) => Transition::Finished(self.fail(e)),
        }
    }

    /// Appends a page and decides whether another call is needed.
    pub fn merge(mut self, samples: Vec<Sample>, codec: &TimestampCodec) -> Transition {
        let page_last = match samples.last() {
            Some(s) => s.pims_time,
            None => return Transition::Finished(self.no_data()),
        };

        if let Some(prev) = self.last_emitted {
            if page_last <= prev {
                warn!(
                    "{}: page ending at {} does not advance past {}, stopping",
                    self.tag, page_last, prev
                );
                return Transition::Finished(self.finish(Outcome::Complete, StopReason::Stagnated));
            }
        }

        // Decode everything first so a bad page leaves the series untouched.
        // Decoding is not monotonic where the anchor offset grows, so calendar
        // order is enforced separately from the PIMS cursor.
        let mut cursor = self.last_emitted;
        let mut newest = self.series.last_timestamp();
        let mut staged = Vec::with_capacity(samples.len());
        for sample in samples {
            if cursor.is_some_and(|c| sample.pims_time <= c) {
                continue;
            }
            cursor = Some(sample.pims_time);

            let ts = match codec.decode(sample.pims_time) {
                Ok(ts) => ts,
                Err(e) => return Transition::Finished(self.fail(FetchError::Parse(e.to_string()))),
            };
            if let Some(prev) = newest.filter(|prev| ts <= *prev) {
                warn!(
                    "{}: PIMS time {} decodes to {}, not after {}; dropped",
                    self.tag, sample.pims_time, ts, prev
                );
                continue;
            }
            newest = Some(ts);
            staged.push((ts, sample.value));
        }

        let added = staged.len();
        for (ts, value) in staged {
            self.series.push(ts, value);
        }
        self.last_emitted = cursor;
        self.pages += 1;

        self.decide(page_last, added)
    }

    fn decide(mut self, page_last: PimsTimestamp, added: usize) -> Transition {
        if page_last < self.window.stop {
            self.window.start = page_last + 1;
            self.needs_next_call = true;
            debug!(
                "{}: page {} added {} samples, next lower bound {}",
                self.tag, self.pages, added, self.window.start
            );
            return Transition::Next(self);
        }

        debug!("{}: page {} added {} samples, window covered", self.tag, self.pages, added);
        Transition::Finished(self.finish(Outcome::Complete, StopReason::ReachedStop))
    }

    fn no_data(self) -> SessionReport {
        if self.series.is_empty() {
            self.finish(Outcome::EmptyWindow, StopReason::NoData)
        } else {
            self.finish(Outcome::Complete, StopReason::EndOfData)
        }
    }

    fn fail(self, e: FetchError) -> SessionReport {
        error!(
            "{}: call {} failed, keeping {} samples: {}",
            self.tag,
            self.calls,
            self.series.len(),
            e
        );
        self.finish(Outcome::PartialDueToError(e), StopReason::Failed)
    }

    fn finish(mut self, outcome: Outcome, stop: StopReason) -> SessionReport {
        self.needs_next_call = false;
        SessionReport {
            series: self.series,
            outcome,
            stop,
            calls: self.calls,
            pages: self.pages,
        }
    }
}

/// Drives one tag through the History endpoint.
pub struct SyncSession<'a> {
    transport: &'a dyn HistoryTransport,
    codec: &'a TimestampCodec,
    builder: &'a QueryBuilder,
    credentials: &'a Credentials,
    timeout: Duration,
    retry: RetryPolicy,
}

impl<'a> SyncSession<'a> {
    pub fn new(
        transport: &'a dyn HistoryTransport,
        codec: &'a TimestampCodec,
        builder: &'a QueryBuilder,
        credentials: &'a Credentials,
    ) -> Self {
        Self {
            transport,
            codec,
            builder,
            credentials,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Requests the page for the state's current window.
    pub async fn fetch(&self, state: &SessionState) -> std::result::Result<ParsedPage, FetchError> {
        let query = self.builder.build(&state.tag, &state.data_source, state.window);
        let (query, transport, credentials, timeout) =
            (&query, self.transport, self.credentials, self.timeout);

        let body = self
            .retry
            .run(
                |_| async move {
                    match tokio::time::timeout(timeout, transport.fetch(query, credentials)).await {
                        Ok(result) => result,
                        Err(_) => Err(TransportError::Timeout(timeout)),
                    }
                },
                |e| !matches!(e, TransportError::Unauthorized(_)),
            )
            .await?;

        parse_history(&body).map_err(|e| FetchError::Parse(e.to_string()))
    }

    /// Runs the session to completion.
    ///
    /// Only invalid input is an `Err`; everything the server does ends up in
    /// the report's `outcome`.
    pub async fn run(
        &self,
        request: &TagRequest,
        data_source: &str,
        window: &TimeWindow,
    ) -> Result<SessionReport> {
        let mut state = SessionState::start(request, data_source, window, self.codec)?;
        let span = info_span!("session", tag = %state.tag, session = %Uuid::new_v4());

        async move {
            info!(
                "fetching {} from {} [{}, {}]",
                state.tag, state.data_source, state.window.start, state.window.stop
            );

            loop {
                let page = self.fetch(&state).await;
                match state.apply(page, self.codec) {
                    Transition::Next(next) => state = next,
                    Transition::Finished(report) => {
                        info!(
                            "finished {}: {:?} ({:?}), {} samples in {} calls",
                            report.series.tag,
                            report.outcome,
                            report.stop,
                            report.series.len(),
                            report.calls
                        );
                        return Ok(report);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}
