mod acquire;
mod recovery;
pub mod ring_session;
mod shared;
mod transfer;
