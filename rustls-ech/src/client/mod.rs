//! Items for use in a client.

mod ech;

pub use ech::{EchConfig, EchGreaseConfig, EchMode, EchOffer, EchState, EchStatus};
