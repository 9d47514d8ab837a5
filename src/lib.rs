//! Core library driving a `gammu-json` subprocess: polling pipeline,
//! multi-part SMS reassembly, send/delete retry queues, and an event
//! dispatcher for embedding applications.

pub mod config;
pub mod error;
pub mod events;
pub mod gateway;
pub mod model;
pub mod pipeline;
pub mod reassembly;
pub mod scheduler;
pub mod segment_store;
pub(crate) mod shutdown;
pub mod subprocess;

pub use config::GatewayOptions;
pub use error::{ErrorScope, GatewayError};
pub use events::{ErrorHandler, Handler, ReceiveHandler, TransmitHandler};
pub use gateway::Gateway;
pub use model::{Message, MessageLocation, OutboundItem, Segment, TransmitCallback, TransmitReceipt};
pub use segment_store::{InMemorySegmentStore, SegmentStore};
pub use subprocess::{SubprocessRunner, TokioSubprocessRunner};
