pub mod pool;

pub use pool::{ActiveView, PoolSettings, RemoteSessionPool, SessionRecord};
