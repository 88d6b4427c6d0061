pub mod client;
pub mod memory;
pub mod pagination;
pub mod postgres;
mod record;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_util;
