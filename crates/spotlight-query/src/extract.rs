//! Result extraction and result sinks

use spotlight_core::{GatherSummary, ResultValue};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::error::QueryError;
use crate::traits::MetadataQuery;

/// Returned by a sink that cannot accept more results
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SinkError(pub String);

/// Receives one value per result, then one completion signal.
///
/// Any `FnMut(ResultValue)` closure is a sink that never fails.
pub trait ResultSink: Send {
    fn on_result(&mut self, value: ResultValue) -> Result<(), SinkError>;

    fn on_complete(&mut self, _summary: &GatherSummary) {}
}

impl<F> ResultSink for F
where
    F: FnMut(ResultValue) + Send,
{
    fn on_result(&mut self, value: ResultValue) -> Result<(), SinkError> {
        self(value);
        Ok(())
    }
}

/// Forwards results into an unbounded channel.
///
/// The channel closes once gathering completes, so a receiver can be read
/// to the end.
pub struct ChannelSink {
    tx: Option<mpsc::UnboundedSender<ResultValue>>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ResultValue>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }
}

impl ResultSink for ChannelSink {
    fn on_result(&mut self, value: ResultValue) -> Result<(), SinkError> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| SinkError("channel already completed".to_string()))?;
        tx.send(value)
            .map_err(|_| SinkError("result receiver dropped".to_string()))
    }

    fn on_complete(&mut self, _summary: &GatherSummary) {
        self.tx = None;
    }
}

/// What one extraction pass did
#[derive(Debug, Default)]
pub struct Extraction {
    pub total: usize,
    pub delivered: usize,
    pub aborted: bool,
    pub error: Option<QueryError>,
}

pub struct ResultExtractor;

impl ResultExtractor {
    /// Visit results `0..count` in order, handing each value to `sink`.
    ///
    /// Without a sink every value is still fetched. A failed fetch ends the
    /// pass; so does a sink error, which also marks the pass aborted.
    pub fn extract(
        query: &dyn MetadataQuery,
        attribute: &str,
        mut sink: Option<&mut dyn ResultSink>,
    ) -> Extraction {
        let total = query.result_count();
        let mut extraction = Extraction {
            total,
            ..Default::default()
        };

        for index in 0..total {
            let value = match query.value_for_attribute(index, attribute) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!("Extraction stopped at result {}: {}", index, e);
                    extraction.error = Some(e);
                    break;
                }
            };

            let Some(sink) = sink.as_deref_mut() else {
                continue;
            };
            if let Err(e) = sink.on_result(value) {
                tracing::warn!("Result sink failed at {} of {}: {}", index, total, e);
                extraction.aborted = true;
                extraction.error = Some(QueryError::Internal(format!("result sink: {}", e)));
                break;
            }
            extraction.delivered += 1;
        }

        extraction
    }
}
