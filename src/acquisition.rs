//! The acquisition loop: read, parse, classify, record, present, label.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::classifier::Classifier;
use crate::display::ResultSink;
use crate::error::LinkError;
use crate::frame::parse_frame;
use crate::history::RollingHistory;
use crate::labeling::{LabelCoordinator, LabelOutcome, LabelPrompt};
use crate::serial_link::{Connector, LinkState, SerialLink};
use crate::store::FingerprintStore;
use crate::types::{ClassificationResult, Identity};

/// Cooperative stop condition shared by the loop, the command reader and the
/// interrupt handler.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    LinkFailed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    pub accepted: u64,
    pub rejected: u64,
    pub labeled: u64,
}

pub struct AcquisitionLoop<C: Connector, S, P> {
    link: SerialLink<C>,
    store: FingerprintStore,
    history: RollingHistory,
    classifier: Classifier,
    sink: S,
    labeling: LabelCoordinator<P>,
    shutdown: Shutdown,
    forward_results: bool,
    last_forwarded: Option<Identity>,
    stats: AcquisitionStats,
}

impl<C, S, P> AcquisitionLoop<C, S, P>
where
    C: Connector,
    S: ResultSink,
    P: LabelPrompt,
{
    pub fn new(
        link: SerialLink<C>,
        store: FingerprintStore,
        labeling: LabelCoordinator<P>,
        sink: S,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            link,
            store,
            history: RollingHistory::default(),
            classifier: Classifier::default(),
            sink,
            labeling,
            shutdown,
            forward_results: false,
            last_forwarded: None,
            stats: AcquisitionStats::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_history(mut self, history: RollingHistory) -> Self {
        self.history = history;
        self
    }

    /// Write `<label>,<distance>` back over the link whenever the identity changes.
    pub fn with_forwarding(mut self, enabled: bool) -> Self {
        self.forward_results = enabled;
        self
    }

    /// Runs until interrupted or the link fails, then releases the link and display.
    pub fn run(&mut self) -> StopReason {
        info!("Acquisition started (threshold {:.1})", self.classifier.threshold);
        let reason = loop {
            if self.shutdown.is_set() {
                break StopReason::Interrupted;
            }
            let line = match self.link.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => continue,
                Err(e) => {
                    error!("{}", e);
                    break StopReason::LinkFailed;
                }
            };
            if line.is_empty() {
                continue;
            }
            if let Err(e) = self.process_line(&line) {
                error!("{}", e);
                break StopReason::LinkFailed;
            }
        };

        self.link.close();
        self.sink.close();
        info!(
            "Acquisition stopped ({:?}): {} accepted, {} rejected, {} labeled",
            reason, self.stats.accepted, self.stats.rejected, self.stats.labeled
        );
        reason
    }

    /// One iteration for a received line. `Ok(None)` when the line was rejected.
    ///
    /// Only a terminal link failure while forwarding is returned as an error.
    pub fn process_line(&mut self, line: &str) -> Result<Option<ClassificationResult>, LinkError> {
        let frame = match parse_frame(line) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("{} | Raw data: {}", e, line);
                self.stats.rejected += 1;
                return Ok(None);
            }
        };
        self.stats.accepted += 1;

        let result = self.classifier.classify(&frame, &self.store);
        debug!("Classified as {} at {:.2}", result.identity, result.distance);

        self.history.push(frame);
        self.sink.present(&result, &frame, &self.history.snapshot());

        if self.forward_results && self.last_forwarded.as_ref() != Some(&result.identity) {
            let outbound = format!("{},{:.2}\n", result.identity, result.distance);
            debug!("Forwarding: {}", outbound.trim_end());
            if self.link.write_line(&outbound)? {
                self.last_forwarded = Some(result.identity.clone());
            } else {
                warn!("Forwarded result was dropped, resending on the next frame");
            }
        }

        if let LabelOutcome::Saved(_) =
            self.labeling.process(&result, &frame, &mut self.store)
        {
            self.stats.labeled += 1;
        }

        Ok(Some(result))
    }

    pub fn store(&self) -> &FingerprintStore {
        &self.store
    }

    pub fn history(&self) -> &RollingHistory {
        &self.history
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn stats(&self) -> AcquisitionStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
