// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

mod batch;
mod progress;
mod propagator;

pub use batch::{BatchCoordinator, BatchJob, BatchNaming, BatchReport, ItemOutcome, ItemStatus};
pub use progress::{BatchStats, ProgressTracker};
pub use propagator::{
    CONTACT_FIELD, DATA_DESCRIPTION_FIELD, METHOD_DESCRIPTION_FIELD, PACKAGE_VERSION_FIELD,
    PRINTOUT_FIELD, Propagator, SPECTRUM_AFTER_FIELD, SPECTRUM_BEFORE_FIELD, X_FWHM_FIELD,
    Y_FWHM_FIELD,
};
