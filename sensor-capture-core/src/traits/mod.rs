pub mod capture_delegate;
pub mod frame_source;
pub mod header_builder;
pub mod signature;
pub mod storage_region;
