//! 缓存数据模型
//! 进程内存储使用的记录结构
pub mod entry;
pub mod rate_limit;

pub use entry::CacheEntry;
pub use rate_limit::{RateLimitRecord, RateLimitStatus};
