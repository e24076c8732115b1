pub mod json;
pub mod style;
pub mod table;
