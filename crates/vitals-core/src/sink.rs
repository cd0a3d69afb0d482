use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::value::MetricValue;

/// 持久化失败的不透明错误形态。
///
/// 核心只负责记录失败并继续下一拍，不对后端错误分类做任何分支，
/// 故边界上采用装箱错误而非枚举。
pub type SinkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 落盘时统一使用的桶名。
pub const PERSIST_BUCKET: &str = "vitals";

/// 时序落盘后端的接口。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合核心不内置任何存储实现，只定义“每拍移交一份字段
///   快照”的写出口；InfluxDB、文件、内存缓冲等后端在各自 crate 中实现。
/// - **契约 (What)**：
///   - 每个采样拍调用一次，与该拍是否产生变更无关（时序语义）；
///   - `bucket` 恒为 [`PERSIST_BUCKET`]，`name` 是监督者名，`fields` 是
///     当拍数据表的完整快照，`tags` 当前恒为空表；
///   - 调度端以超时预算包裹本调用，超时即弃置 Future，实现应容忍
///     写入中途被取消；
///   - 返回的错误只会被记录日志，不会中断采样循环，重试是实现自身的职责。
/// - **设计权衡 (Trade-offs)**：不传递取消令牌参数，弃置即取消是异步
///   Rust 的原生传播方式；需要优雅收尾的后端应自行管理写缓冲。
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// 写出一份字段快照。
    async fn save(
        &self,
        bucket: &str,
        name: &str,
        fields: &BTreeMap<String, MetricValue>,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), SinkError>;
}
