//! In-memory message broker
//!
//! Three typed FIFO queues (download, scan, zip) and a finished table keyed by
//! request id. The broker also tracks which stage each live request is in and
//! which content digests are currently being built, so identical concurrent
//! submissions are scanned and zipped once.

pub mod core;
pub mod state;
pub mod stats;

pub use self::core::{MessageBroker, StageMessage};
pub use state::BuildSlot;
pub use stats::BrokerStats;
