// Library interface for pawtrack
// The viewer and CLI in the binary build on these modules

pub mod analysis;
pub mod config;
pub mod discontinuity;
pub mod errors;
pub mod filter;
pub mod session;
pub mod tracking;
pub mod writer;
pub mod zones;

// Re-export commonly used types
pub use analysis::{Axis, TimeSeries};
pub use config::AppConfig;
pub use discontinuity::{Discontinuity, RepairReport, RepairSettings};
pub use errors::PawtrackError;
pub use filter::FilterSettings;
pub use session::{AnalysisSession, Stage};
pub use tracking::{Keypoint, TrackingFile, load_tracking_json};
pub use zones::{Zone, ZoneSet};
