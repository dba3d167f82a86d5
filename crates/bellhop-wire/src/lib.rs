//! Wire floor for the bellhop host SDK.
//!
//! Everything below the `io` surface lives here: the socket boundary and its
//! websocket implementation, the duplex RPC multiplexer, the typed wire
//! methods exchanged with the coordinator, the render/response packets, the
//! `{json, meta}` value codec, and the reconnect backoff schedule.

pub mod backoff;
pub mod codec;
pub mod envelope;
pub mod methods;
pub mod packets;
pub mod rpc;
pub mod socket;

pub use backoff::{ReconnectHandle, StepBackoff};
pub use codec::Packed;
pub use envelope::{Envelope, ResponseBody};
pub use rpc::{CallMethod, DuplexRpc, RespondMethod, RpcError};
pub use socket::{channel_pair, ChannelCommunicator, Communicator, SocketError, SocketEvent, WsCommunicator};
