mod amount;
mod entry;
pub(crate) mod month;

pub(crate) use amount::Amount;
pub(crate) use entry::Entry;
pub(crate) use month::Month;
