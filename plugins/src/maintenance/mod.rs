pub mod sweep;

pub use sweep::ScratchSweep;
