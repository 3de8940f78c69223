//! Job Queue / Task Processor (§4.5): the durable deque of outstanding
//! ratchet work and the two-executor loop that drains it.

pub mod model;
pub mod processor;
pub mod queue;

pub use model::{InboundTaskMessage, JobModel, OutboundTaskMessage, TaskType};
pub use processor::{JobProcessor, LocalIdentity, RefillCommand};
pub use queue::JobQueue;
