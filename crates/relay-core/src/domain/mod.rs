//! Domain model (ids, message types, envelope, directory, errors).

pub mod directory;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod message;

pub use self::directory::{MessageDirectory, MessageInfo, MessageKind};
pub use self::envelope::{EnvelopeBuilder, ImmutableEnvelope};
pub use self::errors::{ConsumerError, DispatchError, ResolveError, SendError, TransactionError};
pub use self::ids::{EnvelopeId, Id, IdMarker};
pub use self::message::{CommandType, ConsumerType, MessageItem};
