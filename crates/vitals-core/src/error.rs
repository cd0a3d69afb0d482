//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 区分两个层面的失败：探针采样失败是**数据**（挂在状态的错误表上，随快照对外公布），
//!   配置与生命周期失败才是**错误返回值**（`TelemetryError`）；
//! - 为两者提供集中定义，避免上层散落维护错误字符串。
//!
//! ## 设计要求（What）
//! - `TelemetryError` 实现 `thiserror::Error`，并沿用 `<域>.<语义>` 的稳定错误码约定；
//! - `ProbeError` 保持值语义（`Clone + PartialEq`），变更批次需要按值比较实现空写抑制；
//! - `Errors` 以键归档多个并存的采样错误，序列化为 `code -> message` 的映射。

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::value::ValueKind;

/// 单个探针采样失败的记录。
///
/// # 教案式说明
/// - **意图 (Why)**：探针失败不是异常流，而是一条随状态快照对外展示的观测数据；
///   用独立记录类型取代裸字符串，让“按值比较判断是否变化”成为可表达的操作。
/// - **契约 (What)**：仅携带人类可读的消息；实现 `PartialEq` 供空写抑制比较，
///   序列化为裸字符串以保持快照 JSON 紧凑。
/// - **设计权衡 (Trade-offs)**：不携带错误链与分类字段，采样失败的结构化细节
///   应由探针写入独立的状态键；记录保持轻量以便逐拍克隆。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ProbeError {
    message: String,
}

impl ProbeError {
    /// 以消息文本构造记录。
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// 返回消息文本。
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<&str> for ProbeError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ProbeError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl Serialize for ProbeError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.message)
    }
}

/// 按错误码归档的采样错误集合。
///
/// # 教案式说明
/// - **意图 (Why)**：多个探针可能同时处于失败态，单错误槽位会互相覆盖；
///   以稳定错误码为键归档，观测端才能逐项跟踪恢复情况。
/// - **契约 (What)**：
///   - `collect` 对同码的新记录执行整体替换，集合里永远是该码的最新一条；
///   - 键的迭代与序列化顺序稳定（字典序），快照对比工具可直接做文本 diff；
///   - 序列化形态是 `code -> message` 的 JSON 对象。
/// - **执行逻辑 (How)**：内部即 `BTreeMap`，不做任何时间戳或计数聚合；
///   需要频率统计的场景应在观测端完成。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Errors {
    entries: BTreeMap<String, ProbeError>,
}

impl Errors {
    /// 创建空集合。
    pub fn new() -> Self {
        Self::default()
    }

    /// 归档或替换指定错误码下的记录。
    pub fn collect(&mut self, code: impl Into<String>, error: ProbeError) {
        self.entries.insert(code.into(), error);
    }

    /// 移除指定错误码下的记录并返回它。
    pub fn remove(&mut self, code: &str) -> Option<ProbeError> {
        self.entries.remove(code)
    }

    /// 查询指定错误码下的记录。
    pub fn get(&self, code: &str) -> Option<&ProbeError> {
        self.entries.get(code)
    }

    /// 是否存在指定错误码的记录。
    pub fn contains(&self, code: &str) -> bool {
        self.entries.contains_key(code)
    }

    /// 集合是否为空。
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 集合内的记录数量。
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 以字典序遍历 `(code, error)` 记录。
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProbeError)> {
        self.entries.iter().map(|(code, error)| (code.as_str(), error))
    }
}

/// 聚合核心的配置与读取错误域。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合“值类型不匹配”与“生命周期误用”两类调用方错误，
///   与采样失败（[`ProbeError`]）严格分离；后者是数据，前者需要调用方修代码。
/// - **契约 (What)**：
///   - 所有变体 `Send + Sync + 'static`，可安全跨线程传播；
///   - [`code`](TelemetryError::code) 返回稳定错误码，告警与日志检索依赖其不变；
///   - 类型不匹配携带期望/实际的类别标签，文案可直接呈现给仪表盘。
/// - **设计权衡 (Trade-offs)**：键名以 `String` 嵌入错误，牺牲一次克隆换取
///   脱离状态表后仍可独立定位问题键。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TelemetryError {
    /// 读取端请求的标量类别与状态中实际存储的不一致。
    ///
    /// - **意图 (Why)**：同一个键被不同类型覆写通常意味着探针间的键名冲突，
    ///   在读取端显式报错比静默转换更早暴露问题。
    /// - **契约 (What)**：`key` 为被读取的状态键；`expected` 是访问器隐含的类别，
    ///   `actual` 是当前存储值的类别。
    #[error("key `{key}` holds a {actual} value, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// 对同一监督者重复调用 `run`。
    ///
    /// - **意图 (Why)**：采样循环的生命周期是一次性的，重复启动会产生两条
    ///   并行的调度节拍；显式拒绝避免静默的双写。
    /// - **契约 (What)**：`name` 为监督者配置名；已停止的监督者同样拒绝重启，
    ///   需要新循环时应构造新实例。
    #[error("supervisor `{name}` already started")]
    AlreadyStarted { name: String },
}

impl TelemetryError {
    /// 返回稳定错误码，供日志检索与告警规则引用。
    pub fn code(&self) -> &'static str {
        match self {
            Self::TypeMismatch { .. } => codes::STATE_TYPE_MISMATCH,
            Self::AlreadyStarted { .. } => codes::SUPERVISOR_ALREADY_STARTED,
        }
    }
}

/// 内置错误码常量集合，确保日志与告警规则具有稳定识别符。
pub mod codes {
    /// 状态读取端的值类别不匹配。
    pub const STATE_TYPE_MISMATCH: &str = "state.type_mismatch";
    /// 监督者被重复启动。
    pub const SUPERVISOR_ALREADY_STARTED: &str = "supervisor.already_started";
}
