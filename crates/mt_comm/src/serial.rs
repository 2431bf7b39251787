// crates/mt_comm/src/serial.rs

//! 单工作进程通信器

use crate::communicator::{check_group_len, split_send_buffer, Communicator};
use crate::error::{CommError, CommResult};
use parking_lot::Mutex;

/// 单工作进程通信器
///
/// 组大小恒为 1，所有集合操作都是本地运算。
#[derive(Debug, Default)]
pub struct SerialCommunicator {
    aborted: Mutex<Option<String>>,
}

impl SerialCommunicator {
    /// 创建通信器
    pub fn new() -> Self {
        Self::default()
    }

    fn check_aborted(&self) -> CommResult<()> {
        match self.aborted.lock().as_ref() {
            Some(reason) => Err(CommError::Aborted {
                rank: 0,
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather_f64(&self, value: f64) -> CommResult<Vec<f64>> {
        self.check_aborted()?;
        Ok(vec![value])
    }

    fn all_gather_u64(&self, value: u64) -> CommResult<Vec<u64>> {
        self.check_aborted()?;
        Ok(vec![value])
    }

    fn all_to_all_counts(&self, send_counts: &[u64]) -> CommResult<Vec<u64>> {
        self.check_aborted()?;
        check_group_len("send_counts", 1, send_counts.len())?;
        Ok(send_counts.to_vec())
    }

    fn all_to_all_v(
        &self,
        send: &[u8],
        send_counts: &[usize],
        send_displs: &[usize],
    ) -> CommResult<(Vec<u8>, Vec<usize>)> {
        self.check_aborted()?;
        check_group_len("send_counts", 1, send_counts.len())?;
        check_group_len("send_displs", 1, send_displs.len())?;
        let mut chunks = split_send_buffer(send, send_counts, send_displs)?;
        let own = chunks.pop().unwrap_or_default();
        let len = own.len();
        Ok((own, vec![len]))
    }

    fn abort(&self, reason: &str) {
        tracing::error!("Serial communicator aborted: {}", reason);
        self.aborted.lock().get_or_insert_with(|| reason.to_string());
    }
}
