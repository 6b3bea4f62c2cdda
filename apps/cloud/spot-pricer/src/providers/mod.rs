//! Remote pricing service implementations
//!
//! The domain crate only sees `SpotPriceSource`; the EC2 API lives here.

pub mod ec2;

pub use ec2::Ec2SpotPriceSource;
