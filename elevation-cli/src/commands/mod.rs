pub mod info;
pub mod load;
pub mod query;
