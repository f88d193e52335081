pub mod backend;
pub mod delegate;
pub mod segment_queue;
