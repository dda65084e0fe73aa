pub mod cleaning;
pub mod zip_lookup;
