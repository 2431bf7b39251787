// crates/mt_comm/src/local.rs

//! 进程内工作进程组
//!
//! 每个工作进程运行在独立线程上，集合操作通过共享的轮次状态完成：
//! 每轮所有成员各放入一个值，最后到达者发布本轮结果并推进轮次编号，
//! 其余成员在条件变量上等待轮次推进或组被中止。
//!
//! 成员的通信器被析构后，它不会再参加任何轮次：若此时有成员停在未完成的
//! 轮次上，或之后还有成员发起新的轮次，组被中止而不是永远等待。正常流程中
//! 所有成员执行相同的集合操作序列，析构发生在最后一轮完成之后，不受影响。

use crate::communicator::{check_group_len, split_send_buffer, Communicator};
use crate::error::{CommError, CommResult};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::sync::Arc;

type Payload = Box<dyn Any + Send + Sync>;

/// 单轮集合操作状态
struct Round {
    /// 轮次编号
    generation: u64,
    /// 本轮已到达的成员数
    arrived: usize,
    /// 本轮各成员放入的值
    slots: Vec<Option<Payload>>,
    /// 上一轮已发布的结果
    published: Option<Arc<Vec<Payload>>>,
    /// 中止信息 (rank, reason)
    aborted: Option<(usize, String)>,
    /// 已离开组的成员
    departed: Vec<bool>,
}

struct GroupState {
    size: usize,
    round: Mutex<Round>,
    cv: Condvar,
}

impl GroupState {
    fn new(size: usize) -> Self {
        Self {
            size,
            round: Mutex::new(Round {
                generation: 0,
                arrived: 0,
                slots: (0..size).map(|_| None).collect(),
                published: None,
                aborted: None,
                departed: vec![false; size],
            }),
            cv: Condvar::new(),
        }
    }

    fn all_gather<T>(&self, rank: usize, value: T) -> CommResult<Vec<T>>
    where
        T: Any + Clone + Send + Sync,
    {
        let mut round = self.round.lock();
        if let Some((by, reason)) = &round.aborted {
            return Err(CommError::Aborted {
                rank: *by,
                reason: reason.clone(),
            });
        }
        if let Some(gone) = round.departed.iter().position(|&d| d) {
            let reason = format!("rank {} 已离开组, 轮次无法完成", gone);
            round.aborted = Some((gone, reason.clone()));
            self.cv.notify_all();
            return Err(CommError::Aborted { rank: gone, reason });
        }

        let generation = round.generation;
        if round.slots[rank].is_some() {
            return Err(CommError::mismatch(format!(
                "rank {} 在轮次 {} 中重复提交",
                rank, generation
            )));
        }
        round.slots[rank] = Some(Box::new(value));
        round.arrived += 1;

        if round.arrived == self.size {
            let values: Vec<Payload> = round.slots.iter_mut().filter_map(Option::take).collect();
            round.published = Some(Arc::new(values));
            round.arrived = 0;
            round.generation += 1;
            self.cv.notify_all();
        } else {
            while round.generation == generation && round.aborted.is_none() {
                self.cv.wait(&mut round);
            }
            if round.generation == generation {
                let (by, reason) = round.aborted.clone().unwrap_or_default();
                return Err(CommError::Aborted { rank: by, reason });
            }
        }

        let published = round
            .published
            .clone()
            .ok_or_else(|| CommError::mismatch("轮次结果缺失"))?;
        drop(round);

        published
            .iter()
            .enumerate()
            .map(|(from, payload)| {
                payload.downcast_ref::<T>().cloned().ok_or_else(|| {
                    CommError::mismatch(format!(
                        "rank {} 提交的数据类型与 rank {} 不一致",
                        from, rank
                    ))
                })
            })
            .collect()
    }

    fn abort(&self, rank: usize, reason: &str) {
        let mut round = self.round.lock();
        if round.aborted.is_none() {
            round.aborted = Some((rank, reason.to_string()));
        }
        self.cv.notify_all();
    }

    /// 成员离开组；有成员停在未完成的轮次上时中止
    fn depart(&self, rank: usize, panicking: bool) {
        let mut round = self.round.lock();
        round.departed[rank] = true;
        if round.aborted.is_none() {
            if panicking {
                round.aborted = Some((rank, "worker panicked".to_string()));
            } else if round.arrived > 0 {
                round.aborted = Some((rank, format!("rank {} 在集合操作之前退出", rank)));
            }
        }
        self.cv.notify_all();
    }
}

/// 进程内工作进程组构造器
pub struct LocalGroup;

impl LocalGroup {
    /// 创建大小为 `size` 的组，返回按 rank 排列的通信器
    pub fn new(size: usize) -> Vec<LocalCommunicator> {
        let state = Arc::new(GroupState::new(size));
        (0..size)
            .map(|rank| LocalCommunicator {
                rank,
                state: Arc::clone(&state),
            })
            .collect()
    }

    /// 在 `size` 个线程上运行 `worker`，返回按 rank 排列的结果
    ///
    /// 任一线程 panic 时组被中止，所有线程结束后在调用线程上重新抛出该 panic。
    pub fn run<F, R>(size: usize, worker: F) -> Vec<R>
    where
        F: Fn(LocalCommunicator) -> R + Sync,
        R: Send,
    {
        let comms = Self::new(size);
        let worker = &worker;

        let joined: Vec<std::thread::Result<R>> = std::thread::scope(|scope| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    std::thread::Builder::new()
                        .name(format!("worker-{}", comm.rank))
                        .spawn_scoped(scope, move || worker(comm))
                })
                .collect();

            handles
                .into_iter()
                .map(|handle| match handle {
                    Ok(h) => h.join(),
                    Err(e) => Err(Box::new(e) as Box<dyn Any + Send>),
                })
                .collect()
        });

        let mut results = Vec::with_capacity(size);
        for outcome in joined {
            match outcome {
                Ok(r) => results.push(r),
                Err(payload) => std::panic::resume_unwind(payload),
            }
        }
        results
    }
}

/// 进程内组成员通信器
pub struct LocalCommunicator {
    rank: usize,
    state: Arc<GroupState>,
}

impl std::fmt::Debug for LocalCommunicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCommunicator")
            .field("rank", &self.rank)
            .field("size", &self.state.size)
            .finish()
    }
}

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.state.size
    }

    fn all_gather_f64(&self, value: f64) -> CommResult<Vec<f64>> {
        self.state.all_gather(self.rank, value)
    }

    fn all_gather_u64(&self, value: u64) -> CommResult<Vec<u64>> {
        self.state.all_gather(self.rank, value)
    }

    fn all_to_all_counts(&self, send_counts: &[u64]) -> CommResult<Vec<u64>> {
        check_group_len("send_counts", self.size(), send_counts.len())?;
        let all = self
            .state
            .all_gather(self.rank, Arc::new(send_counts.to_vec()))?;
        Ok(all.iter().map(|row| row[self.rank]).collect())
    }

    fn all_to_all_v(
        &self,
        send: &[u8],
        send_counts: &[usize],
        send_displs: &[usize],
    ) -> CommResult<(Vec<u8>, Vec<usize>)> {
        check_group_len("send_counts", self.size(), send_counts.len())?;
        check_group_len("send_displs", self.size(), send_displs.len())?;
        let chunks = Arc::new(split_send_buffer(send, send_counts, send_displs)?);
        let all = self.state.all_gather(self.rank, chunks)?;

        let recv_counts: Vec<usize> = all.iter().map(|c| c[self.rank].len()).collect();
        let mut recv = Vec::with_capacity(recv_counts.iter().sum());
        for chunks in &all {
            recv.extend_from_slice(&chunks[self.rank]);
        }
        Ok((recv, recv_counts))
    }

    fn abort(&self, reason: &str) {
        tracing::error!("Rank {} aborting worker group: {}", self.rank, reason);
        self.state.abort(self.rank, reason);
    }
}

impl Drop for LocalCommunicator {
    fn drop(&mut self) {
        self.state.depart(self.rank, std::thread::panicking());
    }
}
