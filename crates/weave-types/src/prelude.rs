pub use crate::clock::VectorClock;
pub use crate::error::{Error, WeaveResult};
pub use crate::ids::{ActorId, DocumentId, PeerId};
pub use crate::message::{Change, Message};
pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};
