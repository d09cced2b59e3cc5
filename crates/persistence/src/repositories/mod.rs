//! Repository implementations.

mod driver;
mod driver_offer;
mod ride_request;
mod rider;

pub use driver::DriverRepository;
pub use driver_offer::DriverOfferRepository;
pub use ride_request::{NewRideRequest, RideRequestRepository};
pub use rider::RiderRepository;
