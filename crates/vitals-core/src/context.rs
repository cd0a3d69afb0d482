use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::time::Instant;

/// 取消原语，表达采样路径的可中断性契约。
///
/// # 教案式说明
/// - **意图 (Why)**：监督者停机后，仍在执行的探针应尽快自行收束；
///   以轻量原子位提供跨任务共享的取消信号，避免为此引入回调调度。
/// - **契约 (What)**：
///   - 构造后处于“未取消”状态；
///   - `cancel` 首次成功置位时返回 `true`，重复调用返回 `false`，
///     便于调用方避免重复执行兜底逻辑；
///   - 一旦置位，所有克隆体的 `is_cancelled` 全局可见且不可逆。
/// - **执行逻辑 (How)**：内部是 `Arc<AtomicBool>`，克隆即共享同一原子位；
///   置位用 `compare_exchange` 保证“首次”语义。
/// - **设计权衡 (Trade-offs)**：不提供通知回调，长耗时探针需在热点自查；
///   框架不会强行终止正在执行的 Future。
#[derive(Clone, Debug, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
}

impl Cancellation {
    /// 新建取消令牌，初始处于“未取消”状态。
    pub fn new() -> Self {
        Self::default()
    }

    /// 查询取消位是否已被置起。
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// 将令牌置为取消态。
    ///
    /// 首次成功置位返回 `true`；令牌此前已被取消时返回 `false`。
    pub fn cancel(&self) -> bool {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// 单个采样拍传递给探针的上下文：拍时间戳与取消视图。
///
/// - **契约 (What)**：`now` 是本拍的统一时间戳，同拍内所有探针读到同一值；
///   `is_cancelled` 为真时探针应尽快返回，已暂存的写入仍会随批次合并。
#[derive(Clone, Debug)]
pub struct SampleContext {
    now: Instant,
    cancellation: Cancellation,
}

impl SampleContext {
    /// 以拍时间戳与取消令牌构造上下文。
    pub fn new(now: Instant, cancellation: Cancellation) -> Self {
        Self { now, cancellation }
    }

    /// 本拍的时间戳。
    pub fn now(&self) -> Instant {
        self.now
    }

    /// 是否已请求取消。
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// 取消令牌的共享克隆，供探针派生子任务时传递。
    pub fn cancellation(&self) -> Cancellation {
        self.cancellation.clone()
    }
}
