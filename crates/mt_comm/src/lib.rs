// crates/mt_comm/src/lib.rs

//! MantleTrace 通信层
//!
//! 固定大小工作进程组之间的同步集合通信。粒子子系统只依赖
//! [`Communicator`] trait，不关心底层是单进程、线程组还是真正的分布式后端。
//!
//! # 实现
//!
//! - [`SerialCommunicator`]: 单个工作进程，所有集合操作退化为本地运算
//! - [`LocalGroup`] / [`LocalCommunicator`]: 进程内线程组，每个线程模拟一个工作进程
//!
//! # 中止语义
//!
//! 任一工作进程调用 [`Communicator::abort`] 后，组内所有挂起和后续的集合操作
//! 都返回 [`CommError::Aborted`]，其余工作进程因此不会死锁。
//!
//! # 示例
//!
//! ```
//! use mt_comm::{Communicator, LocalGroup};
//!
//! let sums = LocalGroup::run(3, |comm| comm.all_reduce_sum_u64(comm.rank() as u64 + 1));
//! for s in sums {
//!     assert_eq!(s.unwrap(), 6);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod communicator;
pub mod error;
pub mod local;
pub mod serial;

pub use communicator::Communicator;
pub use error::{CommError, CommResult};
pub use local::{LocalCommunicator, LocalGroup};
pub use serial::SerialCommunicator;

/// Prelude 模块
pub mod prelude {
    pub use crate::communicator::Communicator;
    pub use crate::error::{CommError, CommResult};
    pub use crate::local::{LocalCommunicator, LocalGroup};
    pub use crate::serial::SerialCommunicator;
}
