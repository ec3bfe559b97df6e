pub mod json_header;
