//! # supervisor 模块说明
//!
//! ## 角色定位（Why）
//! - 聚合器的调度中枢：单一采样循环驱动全部探针，避免每指标一个定时器带来的
//!   并发写与时序漂移；
//! - 串联四件事：按期采样、批次合并、脏拍通知监听器、逐拍移交落盘快照。
//!
//! ## 设计要求（What）
//! - 循环内任何失败都不外泄：探针失败进错误表，落盘失败记日志后继续下一拍；
//! - 注册操作与进行中的采样拍经同一把异步互斥锁串行化，注册永远落在两拍之间；
//! - 生命周期一次性：`run` 至多成功一次，`stop` 幂等且不等待循环退出。
//!
//! ## 扩展建议（How）
//! - 新的落盘后端实现 [`PersistenceSink`](crate::sink::PersistenceSink) 即可接入；
//! - 观测侧消费请经由 [`State`] 句柄或 HTTP 适配层，不要在监听器里做慢操作，
//!   监听器在采样拍内同步执行。

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error};

use crate::alert::Alert;
use crate::context::{Cancellation, SampleContext};
use crate::error::{Errors, ProbeError, TelemetryError};
use crate::metric::{Metric, Probe};
use crate::sink::{PERSIST_BUCKET, PersistenceSink};
use crate::state::State;

/// 未显式配置时的基准采样间隔。
pub const DEFAULT_SAMPLING_INTERVAL: Duration = Duration::from_secs(1);

/// 未显式配置时的单拍落盘超时预算。
pub const DEFAULT_PERSISTENCE_TIMEOUT: Duration = Duration::from_secs(5);

type Listener = Box<dyn Fn(&State) + Send + Sync>;

/// 采样监督者：驱动探针、合并批次、通知监听器并移交落盘快照。
///
/// # 教案式说明
/// - **意图 (Why)**：把“谁在什么时候采样、结果如何公布”收敛到单一调度点，
///   探针之间不共享可变结构，全部写入都汇入同一个批次。
/// - **契约 (What)**：
///   - 句柄克隆即共享同一监督者，跨任务传递无需额外包装；
///   - [`run`](Supervisor::run) 必须在 Tokio 运行时上下文内调用，循环以独立
///     任务驻留；同一实例至多成功启动一次，已停止的实例同样拒绝再启动；
///   - 每拍顺序固定：采样 -> 原子合并 -> 脏拍时按注册序同步通知监听器 ->
///     无条件落盘移交；
///   - [`stop`](Supervisor::stop) 幂等，向循环发送停机信号并置取消位，
///     不等待在途的一拍完成。
/// - **执行逻辑 (How)**：注册表由 `tokio::sync::Mutex` 保护，采样拍全程持锁，
///   探针与落盘的 `await` 都发生在锁内，注册调用自然排队到拍间隙；
///   节拍用 `interval_at` 推迟一个周期起跳，错过的节拍按跳过处理，不积压补采。
/// - **设计权衡 (Trade-offs)**：慢探针会拖长整拍并推迟其余指标，换来的是
///   单写者模型：状态合并永远无并发写竞争；确有长耗时采样应在探针内部
///   自行分段并响应取消。
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

struct SupervisorInner {
    name: String,
    sampling_interval: Duration,
    persistence_timeout: Duration,
    sink: Option<Arc<dyn PersistenceSink>>,
    state: State,
    cancellation: Cancellation,
    registry: AsyncMutex<Registry>,
    lifecycle: Mutex<Lifecycle>,
}

#[derive(Default)]
struct Registry {
    metrics: BTreeMap<String, Metric>,
    listeners: Vec<Listener>,
}

#[derive(Default)]
struct Lifecycle {
    started: bool,
    shutdown: Option<watch::Sender<bool>>,
}

/// [`Supervisor`] 的装配器，收拢全部可选项后一次成型。
///
/// - **契约 (What)**：`name` 为必选项，同时充当落盘写出的测点名；
///   未显式设置的选项取 [`DEFAULT_SAMPLING_INTERVAL`] 与
///   [`DEFAULT_PERSISTENCE_TIMEOUT`]；不配置落盘后端则跳过移交步骤。
pub struct SupervisorBuilder {
    name: String,
    sampling_interval: Duration,
    persistence_timeout: Duration,
    sink: Option<Arc<dyn PersistenceSink>>,
}

impl SupervisorBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sampling_interval: DEFAULT_SAMPLING_INTERVAL,
            persistence_timeout: DEFAULT_PERSISTENCE_TIMEOUT,
            sink: None,
        }
    }

    /// 设置基准采样间隔，即调度节拍的周期。
    pub fn sampling_interval(mut self, interval: Duration) -> Self {
        self.sampling_interval = interval;
        self
    }

    /// 设置单拍落盘的超时预算，超时即弃置写出。
    pub fn persistence_timeout(mut self, timeout: Duration) -> Self {
        self.persistence_timeout = timeout;
        self
    }

    /// 挂接时序落盘后端。
    pub fn sink(mut self, sink: impl PersistenceSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// 完成装配。
    pub fn build(self) -> Supervisor {
        Supervisor {
            inner: Arc::new(SupervisorInner {
                name: self.name,
                sampling_interval: self.sampling_interval,
                persistence_timeout: self.persistence_timeout,
                sink: self.sink,
                state: State::new(),
                cancellation: Cancellation::new(),
                registry: AsyncMutex::new(Registry::default()),
                lifecycle: Mutex::new(Lifecycle::default()),
            }),
        }
    }
}

impl Supervisor {
    /// 以监督者名开启装配。
    pub fn builder(name: impl Into<String>) -> SupervisorBuilder {
        SupervisorBuilder::new(name)
    }

    /// 监督者名，亦即落盘写出的测点名。
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 共享状态的句柄克隆。
    pub fn state(&self) -> State {
        self.inner.state.clone()
    }

    /// 当前错误表的快照副本。
    pub fn errors(&self) -> Errors {
        self.inner.state.errors()
    }

    /// 注册或替换一个命名指标。
    ///
    /// - **契约 (What)**：`name` 同时是指标在错误表中的错误码，同名注册整体
    ///   替换旧指标并重置其采样时刻；与进行中的采样拍串行化，注册生效于
    ///   下一拍。
    pub async fn add_probe(
        &self,
        name: impl Into<String>,
        interval: Duration,
        probe: impl Probe + 'static,
    ) {
        let name = name.into();
        let metric = Metric::new(name.clone(), interval, probe);
        self.inner.registry.lock().await.metrics.insert(name, metric);
    }

    /// 注册或替换绑定在状态键上的告警。
    pub async fn add_alert(&self, key: impl Into<String>, alert: Alert) {
        let _registry = self.inner.registry.lock().await;
        self.inner.state.add_alert(key, alert);
    }

    /// 追加一个变更监听器，脏拍时按注册顺序同步调用。
    pub async fn add_listener(&self, listener: impl Fn(&State) + Send + Sync + 'static) {
        self.inner
            .registry
            .lock()
            .await
            .listeners
            .push(Box::new(listener));
    }

    /// 带外归档（`Some`）或清除（`None`）一条采样错误。
    ///
    /// 供采样拍之外的路径使用，例如启动自检；与进行中的拍串行化，
    /// 直接落错误表，不经过批次、不触发监听器。
    pub async fn collect_error(&self, code: &str, error: Option<ProbeError>) {
        let _registry = self.inner.registry.lock().await;
        self.inner.state.set_error(code, error);
    }

    /// 启动采样循环。
    ///
    /// - **契约 (What)**：必须在 Tokio 运行时上下文内调用；首拍在一个完整
    ///   采样间隔之后触发；同一实例重复调用返回
    ///   [`TelemetryError::AlreadyStarted`]，包括已停止的实例。
    pub fn run(&self) -> Result<(), TelemetryError> {
        let mut shutdown = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if lifecycle.started {
                return Err(TelemetryError::AlreadyStarted {
                    name: self.inner.name.clone(),
                });
            }
            lifecycle.started = true;
            let (tx, rx) = watch::channel(false);
            lifecycle.shutdown = Some(tx);
            rx
        };

        let supervisor = self.clone();
        tokio::spawn(async move {
            let period = supervisor.inner.sampling_interval;
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    now = ticker.tick() => {
                        supervisor.run_tick(now).await;
                    }
                    _ = shutdown.changed() => {
                        debug!(supervisor = %supervisor.inner.name, "sampling loop stopped");
                        break;
                    }
                }
            }
        });
        Ok(())
    }

    /// 请求停机：发送停机信号并置取消位。幂等；启动前调用是空操作。
    pub fn stop(&self) {
        let lifecycle = self.inner.lifecycle.lock();
        let Some(shutdown) = &lifecycle.shutdown else {
            return;
        };
        let _ = shutdown.send(true);
        self.inner.cancellation.cancel();
    }

    /// 执行一个采样拍。
    ///
    /// 拍内顺序即对外契约：先对每个指标做到期判定，到期者采样、未到期者
    /// 把实时错误表里属于它的条目原样再暂存一次（空写抑制使未变化的
    /// 搬运不置脏）；随后整批合并；脏拍按注册序同步通知监听器；最后
    /// 无论脏否，取一份数据表快照移交落盘后端，超时或失败仅记日志。
    pub(crate) async fn run_tick(&self, now: Instant) {
        let mut registry = self.inner.registry.lock().await;
        let cx = SampleContext::new(now, self.inner.cancellation.clone());
        let mut mutation = self.inner.state.mutation();

        for metric in registry.metrics.values_mut() {
            if metric.is_due(now) {
                metric.sample(&cx, &mut mutation).await;
            } else if let Some(previous) = self.inner.state.error(metric.name()) {
                mutation.set_error(metric.name(), Some(previous));
            }
        }

        let dirty = mutation.apply();
        if dirty {
            for listener in &registry.listeners {
                listener(&self.inner.state);
            }
        }

        if let Some(sink) = &self.inner.sink {
            // 移交语义：快照在读锁内取出后立即释放，写出期间状态不被占用。
            let fields = self.inner.state.values();
            let tags = BTreeMap::new();
            let save = sink.save(PERSIST_BUCKET, &self.inner.name, &fields, &tags);
            match time::timeout(self.inner.persistence_timeout, save).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(
                        supervisor = %self.inner.name,
                        error = %err,
                        "could not save metrics state"
                    );
                }
                Err(_) => {
                    error!(
                        supervisor = %self.inner.name,
                        budget = ?self.inner.persistence_timeout,
                        "persistence sink timed out, dropping this tick's save"
                    );
                }
            }
        }
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("name", &self.inner.name)
            .field("sampling_interval", &self.inner.sampling_interval)
            .field("persistence_timeout", &self.inner.persistence_timeout)
            .finish_non_exhaustive()
    }
}
