pub mod buffer_sizing;
pub mod position;
pub mod region_copy;
pub mod ring_buffer;
