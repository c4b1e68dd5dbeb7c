pub mod frame;
pub mod source_map;
pub mod trace;
