pub(crate) mod backup;
pub(crate) mod list;
pub(crate) mod neutralize;
pub(crate) mod restore;
pub(crate) mod trim;
