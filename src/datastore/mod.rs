//! Datastore contracts: entity blocks, the per-slave context, and the
//! server-wide device-id-indexed context.

pub mod block;
pub mod server;
pub mod slave;

pub use block::{DataBlock, SequentialBlock, SparseBlock};
pub use server::ServerContext;
pub use slave::{EntityKind, SlaveContext, Values};
