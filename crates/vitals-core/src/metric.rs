use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::context::SampleContext;
use crate::mutation::Mutation;

/// 探针接口：每个采样拍向变更批次写入观测值。
///
/// # 教案式说明
/// - **意图 (Why)**：采样逻辑由业务侧提供，核心只负责节律与合并；
///   单方法 trait 是唯一的探针形态，闭包经 [`probe_fn`] 包装后走同一条路径，
///   不存在需要运行期区分的第二种探针类型。
/// - **契约 (What)**：
///   - `cx` 携带本拍时间戳与取消视图，取消后应尽快返回；
///   - 探针失败不是返回值而是数据：把失败写入 `mutation` 的错误槽
///     （`set_error(code, Some(..))`），恢复后写 `None` 清除；
///   - 探针在采样拍内被独占调用（`&mut self`），可安全持有内部状态。
/// - **设计权衡 (Trade-offs)**：方法不返回 `Result`，避免“返回错误”与
///   “归档错误”两套语义并存；慢探针会拖住整拍，节拍丢失由调度端跳过补偿。
#[async_trait]
pub trait Probe: Send {
    /// 执行一次采样，把观测值与错误写入变更批次。
    async fn update_state(&mut self, cx: &SampleContext, mutation: &mut Mutation);
}

/// 把同步闭包适配为 [`Probe`] 的包装器，经 [`probe_fn`] 构造。
pub struct ProbeFn<F> {
    f: F,
}

/// 将 `FnMut(&SampleContext, &mut Mutation)` 闭包包装为探针。
///
/// 适合无须 `await` 的轻量采样；需要异步 I/O 的探针应直接实现 [`Probe`]。
pub fn probe_fn<F>(f: F) -> ProbeFn<F>
where
    F: FnMut(&SampleContext, &mut Mutation) + Send,
{
    ProbeFn { f }
}

#[async_trait]
impl<F> Probe for ProbeFn<F>
where
    F: FnMut(&SampleContext, &mut Mutation) + Send,
{
    async fn update_state(&mut self, cx: &SampleContext, mutation: &mut Mutation) {
        (self.f)(cx, mutation);
    }
}

/// 命名指标：一个探针加上它自己的采样间隔与上次采样时刻。
///
/// # 教案式说明
/// - **意图 (Why)**：不同指标的合理采样频率差异很大（CPU 秒级、证书有效期
///   小时级），每个指标携带自己的间隔，调度端以统一节拍驱动、按期筛选。
/// - **契约 (What)**：
///   - [`is_due`](Metric::is_due)：从未采样过即到期；否则仅当 `now` 严格晚于
///     “上次采样时刻 + 间隔”才到期；
///   - 采样完成后上次采样时刻推进到**本拍**时间戳，错过的节拍不会补采；
///   - `name` 同时充当该指标在错误表里的错误码。
/// - **设计权衡 (Trade-offs)**：间隔以节拍为粒度对齐，实际采样周期向上
///   取整到节拍的整数倍；换来的是单循环、无每指标定时器的简单调度。
pub struct Metric {
    name: String,
    interval: Duration,
    last_update: Option<Instant>,
    probe: Box<dyn Probe>,
}

impl Metric {
    /// 以名称、采样间隔与探针构造指标，初始处于“从未采样”态。
    pub fn new(name: impl Into<String>, interval: Duration, probe: impl Probe + 'static) -> Self {
        Self {
            name: name.into(),
            interval,
            last_update: None,
            probe: Box::new(probe),
        }
    }

    /// 指标名称，亦即其在错误表中的错误码。
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 该指标的采样间隔。
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// 判断在 `now` 这一拍是否应当采样。
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_update {
            None => true,
            Some(last) => now > last + self.interval,
        }
    }

    /// 执行一次采样并把上次采样时刻推进到本拍。
    pub(crate) async fn sample(&mut self, cx: &SampleContext, mutation: &mut Mutation) {
        self.probe.update_state(cx, mutation).await;
        self.last_update = Some(cx.now());
    }
}

impl core::fmt::Debug for Metric {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .field("last_update", &self.last_update)
            .finish_non_exhaustive()
    }
}
