// Runs one session per requested tag

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::credentials::CredentialProvider;
use crate::client::retry::RetryPolicy;
use crate::client::transport::HistoryTransport;
use crate::core::codec::TimestampCodec;
use crate::core::error::Result;
use crate::core::format::{Credentials, TagRequest, TimeWindow};
use crate::core::query::{check_quotable, QueryBuilder};
use crate::core::session::{Outcome, SessionReport, SyncSession};
use crate::models::config_model::ClientConfig;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagResult {
    pub tag: String,
    #[serde(flatten)]
    pub report: SessionReport,
}

pub struct BatchOrchestrator {
    transport: Arc<dyn HistoryTransport>,
    codec: TimestampCodec,
    builder: QueryBuilder,
    timeout: Duration,
    retry: RetryPolicy,
    concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(transport: Arc<dyn HistoryTransport>, config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            codec: config.codec()?,
            builder: config.query_builder(),
            timeout: config.timeout(),
            retry: config.retry.normalized(),
            concurrency: config.concurrency(),
        })
    }

    pub fn session<'a>(&'a self, credentials: &'a Credentials) -> SyncSession<'a> {
        SyncSession::new(self.transport.as_ref(), &self.codec, &self.builder, credentials)
            .with_timeout(self.timeout)
            .with_retry(self.retry.clone())
    }

    pub async fn fetch_tag_history(
        &self,
        request: &TagRequest,
        data_source: &str,
        window: &TimeWindow,
        credentials: &Credentials,
    ) -> Result<SessionReport> {
        self.session(credentials).run(request, data_source, window).await
    }

    /// Fetches every non-blank tag; results keep the request order.
    ///
    /// A failing tag only affects its own outcome. `Err` is reserved for
    /// problems shared by the whole batch: credentials, the data source and
    /// the window. Tags that cannot be put in a query are skipped.
    pub async fn fetch_many_tag_histories(
        &self,
        tags: &[TagRequest],
        data_source: &str,
        window: &TimeWindow,
        provider: &dyn CredentialProvider,
    ) -> Result<Vec<TagResult>> {
        window.validate()?;
        check_quotable("data source", data_source)?;
        let credentials = provider.credentials()?;

        let requests: Vec<&TagRequest> = tags
            .iter()
            .filter(|req| {
                if req.tag.trim().is_empty() {
                    debug!("skipping blank tag entry {:?}", req);
                    return false;
                }
                if let Err(e) = check_quotable("tag", &req.tag) {
                    warn!("skipping tag entry: {}", e);
                    return false;
                }
                true
            })
            .collect();

        info!(
            "batch of {} tag(s), up to {} at a time",
            requests.len(),
            self.concurrency
        );

        let credentials = &credentials;
        let reports: Vec<Result<SessionReport>> = stream::iter(requests)
            .map(|req| async move {
                self.fetch_tag_history(req, data_source, window, credentials).await
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut results = Vec::with_capacity(reports.len());
        for report in reports {
            let report = report?;
            results.push(TagResult {
                tag: report.series.tag.clone(),
                report,
            });
        }

        let failed = results
            .iter()
            .filter(|r| matches!(r.report.outcome, Outcome::PartialDueToError(_)))
            .count();
        info!("batch finished: {} tag(s), {} partial", results.len(), failed);

        Ok(results)
    }
}
