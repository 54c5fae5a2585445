//! Domain model: queue kinds, records, routes, events, ids.

pub mod events;
pub mod ids;
pub mod queue_kind;
pub mod record;
pub mod route;

pub use self::events::{Delivery, DrainReport, QueueEvent, SyncMessage};
pub use self::ids::{ClientId, SyncRunId};
pub use self::queue_kind::{QueueKind, RECOGNIZED_PREFIXES, UnknownQueue};
pub use self::record::{QueueRecord, RecordId};
pub use self::route::{HttpMethod, ReplayRequest, RouteError};
