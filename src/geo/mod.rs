pub mod geocoder;
pub mod throttle;

pub use geocoder::{describe_or_coordinates, locate_or_fallback, Geocoder};
pub use throttle::Throttle;
