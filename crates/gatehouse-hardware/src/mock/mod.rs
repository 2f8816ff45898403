//! Mock GPIO implementations for testing and GPIO-less deployments.

mod edges;
mod pin;

pub use edges::{MockEdgePort, MockEdgeSource, MockReaderHandle};
pub use pin::MockPin;
