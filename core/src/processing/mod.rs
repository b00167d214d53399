pub mod process_control;
pub mod staging;
pub mod startup_self_check;
pub mod video;
