pub mod inference;
pub mod record;
