//! Remote service communication.
//!
//! Three independent capabilities (content, message, social) can each be
//! switched between a live network transport and a canned offline one. The
//! [`CommsManager`] is the single dispatch point: it checks configuration,
//! picks the transport, validates replies and maps every failure into a
//! [`CommsError`].

pub mod api_types;
pub mod error;
pub mod live;
pub mod manager;
pub mod mode;
pub mod offline;
pub mod parser;
pub mod transport;
pub mod types;

pub use error::CommsError;
pub use live::LiveTransport;
pub use manager::CommsManager;
pub use mode::{Capability, Modes, TransportMode};
pub use offline::OfflineTransport;
pub use parser::{JsonResponseParser, ResponseParser};
pub use transport::Transport;
pub use types::{
  Content, ContentQuery, Credential, CredentialRequest, MessagePayload, PostPayload, RawResponse,
  Tag, TagQuery,
};
