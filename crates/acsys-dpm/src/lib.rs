//! DPM list-protocol client.
//!
//! A [`ListSession`] opens a list on a Data Pool Manager over a shared
//! [`BusSession`](acsys_acnet::BusSession), loads it with tagged data
//! requests and turns the service's replies into [`ItemData`] and
//! [`ItemStatus`] records. Replies left over from an earlier start of the
//! list are filtered out by a two-bit generation stamped into every
//! reference id.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use acsys_acnet::{BusSession, SessionConfig};
//! use acsys_dpm::{JsonCodec, ListItem, ListOptions, ListSession};
//!
//! let bus = Arc::new(BusSession::connect_with_config(SessionConfig::default())?);
//! let mut list = ListSession::connect(bus, JsonCodec, ListOptions::default())?;
//! list.add_entry(0, "M:OUTTMP@p,1000");
//!
//! for item in list.process(None)? {
//!     if let ListItem::Data(data) = item? {
//!         println!("temperature: {} F", data.value);
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod codec;
pub mod credential;
pub mod error;
pub mod generation;
pub mod item;
pub mod list;
pub mod options;
pub mod protocol;
pub mod settings;
pub mod translate;

pub use codec::{JsonCodec, ListCodec};
pub use credential::{Credential, CredentialProvider, NoCredentials};
pub use error::{ListError, ProtocolError, Result};
pub use generation::Generations;
pub use item::{ItemData, ItemStatus, ItemValue, ListItem, Tag, Translated};
pub use list::{ListSession, ListState, Pending, Process};
pub use options::{ListOptions, ListTimeouts, Mode};
pub use protocol::{ListReply, ListRequest};
pub use settings::SettingValue;
