pub(crate) mod encode;
pub(crate) mod extractor;
pub(crate) mod source;
