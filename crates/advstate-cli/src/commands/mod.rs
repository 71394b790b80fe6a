pub mod key;
pub mod records;
