pub mod file_region;
pub mod memory_region;
pub mod record;
pub mod report_file;
pub mod storage_sink;
