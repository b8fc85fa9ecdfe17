pub(crate) mod cache;
pub(crate) mod coordinator;
pub(crate) mod debounce;
pub(crate) mod regen;
pub(crate) mod status;
pub(crate) mod upload;
