pub mod cred_list;
pub mod dedup;

pub use cred_list::CredList;
pub use dedup::DedupStore;
