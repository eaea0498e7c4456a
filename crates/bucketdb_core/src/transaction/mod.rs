//! Transactions.
//!
//! - **Atomicity**: a write transaction's changes reach the log as one run
//!   and are published with a single pointer swap
//! - **Isolation**: readers work on an immutable snapshot taken at begin
//! - **Durability**: the run is flushed (and synced by default) before
//!   commit returns
//!
//! Only one write transaction may be live at a time; any number of read
//! transactions may run alongside it.

mod manager;
mod state;

pub use manager::TransactionManager;
pub use state::{ReadTransaction, TransactionState, WriteTransaction};
