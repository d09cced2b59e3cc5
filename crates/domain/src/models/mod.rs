//! Domain model definitions.

pub mod driver;
pub mod driver_offer;
pub mod ride_request;
pub mod rider;
pub mod surge;

pub use driver::{
    Driver, DriverLocationUpdate, DriverStatus, LocationUpdateResponse, NearbyDriver, NearbyQuery,
    RegisterDriverRequest, UpdateDriverStatusRequest, VehicleTier,
};
pub use driver_offer::{DriverOffer, OfferStatus};
pub use ride_request::{
    Coordinates, CreateRideRequest, DispatchOutcome, DriverResponseAction, DriverResponseRequest,
    DriverResponseResult, MatchedDriver, PaymentMethod, RideDetailsResponse, RideRequest,
    RideRequestResponse, RideStatus,
};
pub use rider::Rider;
pub use surge::{CalculateSurgeRequest, IncrementDemandRequest, SurgeInfo, SurgeZone};
