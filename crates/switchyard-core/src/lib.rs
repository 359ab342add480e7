//! Switchyard Core
//!
//! Sans-IO building blocks of the Switchyard component manager: three-part
//! addresses, move-only typed messages, the binary frame codec, message
//! filters, and the ordered inbox. Nothing in this crate reads a clock or
//! touches a transport; time arrives through `TimeSource`.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod address;
pub mod codec;
pub mod config;
pub mod errors;
pub mod filter;
pub mod inbox;
pub mod message;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use address::{Address, ADDRESS_SIZE, UNSET_FIELD};
pub use config::ManagerConfig;
pub use errors::{CodecError, ErrorKind, Result, SwitchyardError};
pub use filter::{AddressFilter, FilterId, FilterSet, KindFilter, MessageFilter};
pub use inbox::{Inbox, InsertOutcome, QueueKey};
pub use message::{ComponentType, Message, MessageBody, MessageKind, StatusCode};
pub use types::{millis_to_duration, MonotonicTimeSource, TimeSource, Timestamp};
