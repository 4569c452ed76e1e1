//! External service integrations.

pub mod kyc_client {
    pub use crate::kyc_client::*;
}

pub mod scoring_client {
    pub use crate::scoring_client::*;
}

pub mod services {
    pub use crate::services::*;
}
