//! Building a camp once a spot has been found.
//!
//! - **factory**: the shell itself plus its door and authorization fixtures
//! - **interior**: furnishing with nested position/rotation retries and a fit-check
//! - **perimeter**: optional hazards outside and a defensive object on top

mod factory;
mod interior;
mod perimeter;

pub use factory::StructureFactory;
pub use interior::{FurnishReport, InteriorPopulator};
pub use perimeter::{Perimeter, loaded_ammo};
