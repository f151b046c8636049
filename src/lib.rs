pub mod bods;
pub mod fetch;
pub mod otc;
pub mod output;
pub mod reports;
pub mod table;
