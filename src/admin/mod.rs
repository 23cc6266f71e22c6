pub mod metrics;

pub use metrics::{AdminState, Metrics};
