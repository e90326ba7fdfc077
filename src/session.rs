// Workflow state: import -> repair -> filter -> visualize

use std::path::Path;

use log::info;

use crate::PawtrackError;
use crate::discontinuity::{self, RepairReport, RepairSettings};
use crate::filter::{self, FilterSettings};
use crate::tracking::{TrackingFile, load_tracking_json};

/// Processing stage a dataset belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Raw,
    Processed,
    Filtered,
}

#[derive(Clone, Debug, Default)]
pub struct AnalysisSession {
    raw: TrackingFile,
    processed: Option<TrackingFile>,
    filtered: Option<TrackingFile>,
    last_report: Option<RepairReport>,
}

impl AnalysisSession {
    pub fn new(raw: TrackingFile) -> Self {
        Self {
            raw,
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self, PawtrackError> {
        Ok(Self::new(load_tracking_json(path)?))
    }

    pub fn raw(&self) -> &TrackingFile {
        &self.raw
    }

    pub fn processed(&self) -> Option<&TrackingFile> {
        self.processed.as_ref()
    }

    pub fn filtered(&self) -> Option<&TrackingFile> {
        self.filtered.as_ref()
    }

    pub fn last_report(&self) -> Option<&RepairReport> {
        self.last_report.as_ref()
    }

    /// Repairs the raw data. Any earlier filter result is dropped since it
    /// was computed from other input.
    pub fn repair(&mut self, settings: &RepairSettings) -> &RepairReport {
        let (processed, report) = discontinuity::repair(&self.raw, settings);
        self.processed = Some(processed);
        self.filtered = None;
        self.last_report.insert(report)
    }

    /// Filters the repaired data when there is some, the raw data otherwise.
    pub fn filter(&mut self, settings: &FilterSettings) -> &TrackingFile {
        let (stage, input) = self.filter_input();
        info!("Filtering {:?} data", stage);
        let filtered = filter::apply(input, settings);
        self.filtered.insert(filtered)
    }

    pub fn filter_input(&self) -> (Stage, &TrackingFile) {
        match &self.processed {
            Some(processed) => (Stage::Processed, processed),
            None => (Stage::Raw, &self.raw),
        }
    }

    /// The most processed data available, used for plotting.
    pub fn latest(&self) -> (Stage, &TrackingFile) {
        match &self.filtered {
            Some(filtered) => (Stage::Filtered, filtered),
            None => self.filter_input(),
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&TrackingFile> {
        match stage {
            Stage::Raw => Some(&self.raw),
            Stage::Processed => self.processed(),
            Stage::Filtered => self.filtered(),
        }
    }
}
