pub mod family_db;
pub mod legacy;
pub mod registry;
