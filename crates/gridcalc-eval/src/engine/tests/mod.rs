mod common;
mod cycle_detection;
