pub(crate) mod about;
