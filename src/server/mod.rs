//! Chat relay server
//!
//! ## Layout
//!
//! - **Registry**: every connected client behind one exclusive lock
//! - **Hub**: registry plus the producer side of the broadcast queue
//! - **Dispatcher**: single consumer that writes each broadcast to all alive clients
//! - **Session**: one task per connection, handshake then line relay
//! - **Listener**: TCP accept loop spawning sessions

pub mod dispatcher;
pub mod hub;
pub mod listener;
pub mod registry;
pub mod session;

pub use dispatcher::{DeliveryReport, Dispatcher};
pub use hub::{ChatHub, HubStats};
pub use listener::{ChatServer, ServerStats};
pub use registry::{ClientRegistry, ClientState};
pub use session::{Session, SessionState, SessionSummary};
