pub mod csv;
pub mod output;
