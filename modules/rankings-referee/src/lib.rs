pub mod approval;
pub mod referee;

pub use approval::ApprovalGate;
pub use referee::{median, Referee, RefereeReport, MIN_GROUP_SIZE, OUTLIER_DISTANCE};
