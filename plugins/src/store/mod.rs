pub mod local;

pub use local::FsObjectStore;
