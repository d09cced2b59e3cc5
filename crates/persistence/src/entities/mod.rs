//! Entity definitions (database row mappings).

mod driver;
mod driver_offer;
mod ride_request;
mod rider;

pub use driver::DriverEntity;
pub use driver_offer::DriverOfferEntity;
pub use ride_request::RideRequestEntity;
pub use rider::RiderEntity;
