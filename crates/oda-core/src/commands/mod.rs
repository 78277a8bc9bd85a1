pub mod backup;
pub mod neutralize;
pub mod restore;
pub mod trim;
