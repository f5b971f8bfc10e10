use crate::config::{ClientConfig, RetryPolicy};
use crate::core::{Outcome, Result, StoreError, VersionTag};
use crate::retry::{AttemptFailure, bounded, run_attempts};
use crate::service::{MetadataHandle, MetadataMap};
use http::StatusCode;
use log::warn;
use std::time::Duration;
use tracing::{Instrument, info_span};

/// Folds key/value pairs into an object's metadata under concurrent writers.
///
/// Each attempt re-reads the current map and version, overlays the pairs and
/// writes back conditioned on that version. A 412 means someone else won the
/// race; the patcher waits and starts over from a fresh read.
#[derive(Debug, Clone)]
pub struct MetadataPatcher {
    policy: RetryPolicy,
    request_timeout: Duration,
}

impl MetadataPatcher {
    pub fn new() -> Self {
        Self::from_config(&ClientConfig::default())
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            policy: config.metadata_patch.clone(),
            request_timeout: config.request_timeout,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Merges `pairs` into the object's metadata and returns the new version tag.
    ///
    /// Keys not named in `pairs` keep their current values. Losing the race on
    /// every attempt raises [`StoreError::Timeout`] carrying the last 412; any
    /// other failure is raised as it came.
    pub async fn patch<H, I, K, V>(&self, handle: &H, pairs: I) -> Result<VersionTag>
    where
        H: MetadataHandle + ?Sized,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        let span = info_span!("metadata.patch", keys = pairs.len());

        let outcome = run_attempts(
            &self.policy,
            |err: &StoreError| err.status() == Some(StatusCode::PRECONDITION_FAILED),
            |_attempt| self.attempt_patch(handle, &pairs),
        )
        .instrument(span)
        .await;

        match outcome {
            Ok(version) => Ok(version),
            Err(AttemptFailure::Rejected(err)) => Err(err),
            Err(AttemptFailure::Exhausted { last, attempts }) => {
                warn!(
                    "metadata patch lost the version race {} times, giving up",
                    attempts
                );
                Err(StoreError::timeout(
                    format!(
                        "metadata patch still contended after {} attempts",
                        attempts
                    ),
                    Some(last),
                ))
            }
        }
    }

    async fn attempt_patch<H>(&self, handle: &H, pairs: &[(String, String)]) -> Result<VersionTag>
    where
        H: MetadataHandle + ?Sized,
    {
        let current = bounded(
            self.request_timeout,
            "object metadata",
            handle.fetch_metadata(),
        )
        .await?;

        let mut merged = current.metadata;
        for (key, value) in pairs {
            merged.insert(key.clone(), value.clone());
        }

        bounded(
            self.request_timeout,
            "object metadata",
            handle.set_metadata(merged, Some(&current.version)),
        )
        .await
    }

    /// Current metadata and its version; a missing object is a 404 outcome.
    pub async fn retrieve<H>(&self, handle: &H) -> Result<Outcome<MetadataMap>>
    where
        H: MetadataHandle + ?Sized,
    {
        match bounded(self.request_timeout, "object metadata", handle.fetch_metadata()).await {
            Ok(current) => Ok(Outcome::ok(current.metadata).with_version(Some(current.version))),
            Err(err) => Outcome::from_error(err),
        }
    }
}

impl Default for MetadataPatcher {
    fn default() -> Self {
        Self::new()
    }
}
