//! Instance-state event rule synchronization
//!
//! Each cluster owns one event-matching rule and one delivery target in a
//! remote rule store. The rule's pattern document doubles as the database:
//! the set of monitored instance ids is embedded in it and updated through
//! read-modify-write, with no state held in this process between calls.
//!
//! Known limitation: the read-modify-write sequence is not transactional. A
//! concurrent writer updating the same rule between the read and the write
//! is silently overwritten (last writer wins). Each cluster has at most one
//! writer in practice, so this is accepted rather than guarded.

pub mod pattern;
pub mod rule;
pub mod store;

pub use pattern::{EventDetail, EventPattern, EVENT_SOURCE, INSTANCE_STATE_CHANGE_NOTIFICATION};
pub use rule::InstanceStateService;
pub use store::{
    EventRule, QueueAttributes, QueueStore, RuleState, RuleStore, RuleTarget, StoreError,
};
