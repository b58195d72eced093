#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod error;
pub mod ids;
pub mod message;
pub mod prelude;

pub use clock::VectorClock;
pub use error::{Error, WeaveResult};
pub use ids::{ActorId, DocumentId, PeerId};
pub use message::{Change, Message};
