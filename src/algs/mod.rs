//! Communication backends, wire records and collectives.

pub mod collective;
pub mod communicator;
pub mod wire;

pub use collective::{all_gather, all_reduce_or, all_to_all_varcount, exchange_payloads};
pub use communicator::{CommTag, Communicator, NoComm, RayonComm, Wait, run_local};
