#![deny(unsafe_code)]
#![doc = "vitals-core: 进程内遥测聚合核心（版本化状态事务 + 探针采样调度）。"]
#![doc = ""]
#![doc = "== 核心抽象 =="]
#![doc = "1. `State`：并发可读的单一真相源，数据、采样错误、告警触发位同锁归档；数据表只增不删。"]
#![doc = "2. `Mutation`：对照实时状态的暂存变更批次，等值写入被抑制，`apply` 一次性原子合并并返回脏标记。"]
#![doc = "3. `Metric`/`Probe`：命名指标携带自身采样间隔与探针；闭包经 `probe_fn` 适配为同一探针形态。"]
#![doc = "4. `Supervisor`：单一采样循环按拍驱动全部指标，脏拍同步通知监听器，每拍向 `PersistenceSink` 移交数据表快照。"]
#![doc = ""]
#![doc = "== 并发与时序契约 =="]
#![doc = "状态锁从不跨越 `await`；注册操作与采样拍经同一把异步互斥锁串行化；"]
#![doc = "错过的节拍跳过不补采；落盘超时即弃置写出，采样循环永不因旁路失败而中断。"]
#![doc = ""]
#![doc = "== 失败语义 =="]
#![doc = "探针失败是数据：写入错误表并随快照对外公布，恢复时清除；"]
#![doc = "`TelemetryError` 仅覆盖调用方错误（类型不匹配、重复启动），并带稳定错误码。"]

/// 统一 re-export 宏属性：实现 [`Probe`](metric::Probe) 或
/// [`PersistenceSink`](sink::PersistenceSink) 的调用方无需直接依赖
/// `async-trait`，避免版本漂移。
pub use async_trait::async_trait;

pub mod alert;
pub mod context;
pub mod error;
pub mod metric;
pub mod mutation;
pub mod sink;
pub mod state;
pub mod supervisor;
pub mod value;

pub use alert::{Alert, AlertCondition, AlertSnapshot, Alerts};
pub use context::{Cancellation, SampleContext};
pub use error::{Errors, ProbeError, TelemetryError, codes};
pub use metric::{Metric, Probe, ProbeFn, probe_fn};
pub use mutation::Mutation;
pub use sink::{PERSIST_BUCKET, PersistenceSink, SinkError};
pub use state::{State, StateSnapshot};
pub use supervisor::{
    DEFAULT_PERSISTENCE_TIMEOUT, DEFAULT_SAMPLING_INTERVAL, Supervisor, SupervisorBuilder,
};
pub use value::{MetricValue, ValueKind};
