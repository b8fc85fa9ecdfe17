pub(crate) mod blob;
pub(crate) mod filters;
pub(crate) mod frame;
