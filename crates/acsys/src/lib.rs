//! Clients for the Fermilab accelerator control system.
//!
//! acsys talks to ACNET through the acnetd TCP gateway and layers the Data
//! Pool Manager list protocol on top of it.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connection to the acnetd gateway
//! - [`frame`]: Length-prefixed gateway framing and reply headers
//! - [`acnet`]: Bus session: node lookup, requests and reply routing (behind `acnet` feature)
//! - [`dpm`]: DPM list sessions (behind `dpm` feature)

/// Re-export transport types.
pub mod transport {
    pub use acsys_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use acsys_frame::*;
}

/// Re-export bus session types (requires `acnet` feature).
#[cfg(feature = "acnet")]
pub mod acnet {
    pub use acsys_acnet::*;
}

/// Re-export DPM list types (requires `dpm` feature).
#[cfg(feature = "dpm")]
pub mod dpm {
    pub use acsys_dpm::*;
}
