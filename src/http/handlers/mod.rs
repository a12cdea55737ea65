//! Request handlers, grouped by route family.

pub(crate) mod documents;
pub(crate) mod health;
