mod model;
mod region;

pub use model::*;
pub use region::{Region, REGIONS};
