// crates/mt_comm/src/communicator.rs

//! 集合通信 trait
//!
//! 实现者只需提供四个原语（两种 all-gather、计数 all-to-all、变长字节 all-to-all）
//! 与中止操作，规约和前缀和由默认方法在其上构建。
//!
//! 所有规约都按 rank 顺序折叠，因此同一组输入在每个工作进程上得到逐位相同的结果。

use crate::error::{CommError, CommResult};

/// 工作进程组通信器
///
/// 每个集合操作都必须由组内所有工作进程以相同顺序调用。
pub trait Communicator: Send {
    /// 本工作进程编号 `[0, size)`
    fn rank(&self) -> usize;

    /// 组大小
    fn size(&self) -> usize;

    // ========================================================================
    // 原语
    // ========================================================================

    /// 收集每个工作进程的一个 `f64`，结果按 rank 排列
    fn all_gather_f64(&self, value: f64) -> CommResult<Vec<f64>>;

    /// 收集每个工作进程的一个 `u64`，结果按 rank 排列
    fn all_gather_u64(&self, value: u64) -> CommResult<Vec<u64>>;

    /// 计数交换
    ///
    /// `send_counts[r]` 是发往 rank `r` 的数量；返回值第 `r` 项是 rank `r` 发来的数量。
    fn all_to_all_counts(&self, send_counts: &[u64]) -> CommResult<Vec<u64>>;

    /// 变长字节交换
    ///
    /// 发往 rank `r` 的数据是 `send[send_displs[r]..send_displs[r] + send_counts[r]]`。
    /// 返回按 rank 顺序拼接的接收缓冲区，以及每个来源的字节数。
    fn all_to_all_v(
        &self,
        send: &[u8],
        send_counts: &[usize],
        send_displs: &[usize],
    ) -> CommResult<(Vec<u8>, Vec<usize>)>;

    /// 中止整个工作进程组
    ///
    /// 之后组内所有集合操作返回 [`CommError::Aborted`]。
    fn abort(&self, reason: &str);

    // ========================================================================
    // 派生操作
    // ========================================================================

    /// 全局求和
    fn all_reduce_sum_f64(&self, value: f64) -> CommResult<f64> {
        Ok(self.all_gather_f64(value)?.iter().sum())
    }

    /// 全局求和（整数）
    fn all_reduce_sum_u64(&self, value: u64) -> CommResult<u64> {
        Ok(self.all_gather_u64(value)?.iter().sum())
    }

    /// 全局最大值
    fn all_reduce_max_f64(&self, value: f64) -> CommResult<f64> {
        Ok(self
            .all_gather_f64(value)?
            .into_iter()
            .fold(f64::NEG_INFINITY, f64::max))
    }

    /// 包含式前缀和：rank `r` 得到 `v_0 + ... + v_r`
    fn scan_sum_f64(&self, value: f64) -> CommResult<f64> {
        let all = self.all_gather_f64(value)?;
        Ok(all[..=self.rank()].iter().sum())
    }

    /// 排他式前缀和：rank `r` 得到 `v_0 + ... + v_{r-1}`，rank 0 得到 0
    fn exclusive_scan_sum_u64(&self, value: u64) -> CommResult<u64> {
        let all = self.all_gather_u64(value)?;
        Ok(all[..self.rank()].iter().sum())
    }

    /// 同步屏障
    fn barrier(&self) -> CommResult<()> {
        self.all_gather_u64(0).map(|_| ())
    }
}

/// 校验按 rank 索引的参数长度
pub(crate) fn check_group_len(name: &'static str, expected: usize, actual: usize) -> CommResult<()> {
    if expected != actual {
        return Err(CommError::GroupSizeMismatch {
            name,
            expected,
            actual,
        });
    }
    Ok(())
}

/// 按计数与偏移切出发往每个 rank 的数据块
pub(crate) fn split_send_buffer(
    send: &[u8],
    send_counts: &[usize],
    send_displs: &[usize],
) -> CommResult<Vec<Vec<u8>>> {
    send_counts
        .iter()
        .zip(send_displs)
        .enumerate()
        .map(|(dest, (&count, &start))| {
            let end = start.checked_add(count).unwrap_or(usize::MAX);
            send.get(start..end)
                .map(|chunk| chunk.to_vec())
                .ok_or(CommError::SendRangeOutOfBounds {
                    dest,
                    start,
                    end,
                    len: send.len(),
                })
        })
        .collect()
}
