//! # state 模块说明
//!
//! ## 角色定位（Why）
//! - 聚合器的单一真相源：探针产出、采样错误、告警触发位都归档在同一张受锁保护的表上；
//! - 读取端（监听器、HTTP 适配、落盘）透过句柄并发访问，写入只经由变更批次原子合并。
//!
//! ## 设计要求（What）
//! - 数据表只增不删：键可以新增或覆写，任何路径都不得移除既有键，删除能力在 API 层面不存在；
//! - 合并与告警评估在同一次写锁内完成，并发读者不会观测到“半个批次”。

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Serialize, Serializer};

use crate::alert::{Alert, AlertSnapshot, Alerts};
use crate::error::{Errors, ProbeError, TelemetryError};
use crate::mutation::Mutation;
use crate::value::{MetricValue, ValueKind};

/// 版本化遥测状态的共享句柄。
///
/// # 教案式说明
/// - **意图 (Why)**：监督者、探针、监听器与适配层需要指向同一份状态；
///   句柄内部仅是 `Arc`，克隆即共享，避免在各层传播裸引用与生命周期。
/// - **契约 (What)**：
///   - 类型化读取（[`integer`](State::integer) 等）对缺失键返回零值，对类别不符
///     返回 [`TelemetryError::TypeMismatch`]，绝不 panic；
///   - 写入唯一入口是 [`mutation`](State::mutation) 开启的批次，批次经
///     `apply` 一次性落表；
///   - 所有读取都在读锁内完成后立即释放，锁从不跨越 `await`。
/// - **执行逻辑 (How)**：内部一把 `RwLock` 罩住数据、错误、告警三张表；
///   单锁保证“合并 + 告警评估”的原子性，分片方案无法提供该性质。
/// - **设计权衡 (Trade-offs)**：读写竞争集中在一把锁上；聚合器的写入节奏是
///   秒级采样拍，锁并非热点，换来的原子可见性是对外契约的根基。
#[derive(Clone, Debug, Default)]
pub struct State {
    shared: Arc<StateShared>,
}

#[derive(Debug, Default)]
struct StateShared {
    tables: RwLock<Tables>,
}

#[derive(Debug, Default)]
struct Tables {
    data: BTreeMap<String, MetricValue>,
    errors: Errors,
    alerts: Alerts,
}

/// 状态的可序列化快照：数据、错误、告警三个成员，后两者为空时省略。
#[derive(Clone, Debug, Serialize)]
pub struct StateSnapshot {
    pub state: BTreeMap<String, MetricValue>,
    #[serde(skip_serializing_if = "Errors::is_empty")]
    pub errors: Errors,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub alerts: BTreeMap<String, AlertSnapshot>,
}

impl State {
    /// 创建三表皆空的状态。
    pub fn new() -> Self {
        Self::default()
    }

    /// 开启一个以当前状态为对照基准的变更批次。
    pub fn mutation(&self) -> Mutation {
        Mutation::begin(self.clone())
    }

    /// 读取整数键；缺失返回 `0`，类别不符返回错误。
    pub fn integer(&self, key: &str) -> Result<i64, TelemetryError> {
        let tables = self.shared.tables.read();
        match tables.data.get(key) {
            None => Ok(0),
            Some(MetricValue::Integer(v)) => Ok(*v),
            Some(other) => Err(Self::mismatch(key, ValueKind::Integer, other)),
        }
    }

    /// 读取浮点键；缺失返回 `0.0`，类别不符返回错误。
    pub fn float(&self, key: &str) -> Result<f64, TelemetryError> {
        let tables = self.shared.tables.read();
        match tables.data.get(key) {
            None => Ok(0.0),
            Some(MetricValue::Float(v)) => Ok(*v),
            Some(other) => Err(Self::mismatch(key, ValueKind::Float, other)),
        }
    }

    /// 读取布尔键；缺失返回 `false`，类别不符返回错误。
    pub fn boolean(&self, key: &str) -> Result<bool, TelemetryError> {
        let tables = self.shared.tables.read();
        match tables.data.get(key) {
            None => Ok(false),
            Some(MetricValue::Boolean(v)) => Ok(*v),
            Some(other) => Err(Self::mismatch(key, ValueKind::Boolean, other)),
        }
    }

    /// 读取任意键的展示文本；缺失返回空串，非文本值做尽力转换，永不失败。
    pub fn text(&self, key: &str) -> String {
        let tables = self.shared.tables.read();
        tables
            .data
            .get(key)
            .map(MetricValue::to_string)
            .unwrap_or_default()
    }

    /// 读取任意键的原始值。
    pub fn value(&self, key: &str) -> Option<MetricValue> {
        self.shared.tables.read().data.get(key).cloned()
    }

    /// 当前是否存在任何采样错误。
    pub fn has_errors(&self) -> bool {
        !self.shared.tables.read().errors.is_empty()
    }

    /// 读取指定错误码下的采样错误。
    pub fn error(&self, code: &str) -> Option<ProbeError> {
        self.shared.tables.read().errors.get(code).cloned()
    }

    /// 导出错误表的快照副本。
    pub fn errors(&self) -> Errors {
        self.shared.tables.read().errors.clone()
    }

    /// 导出数据表的快照副本，作为落盘等旁路消费的移交载体。
    pub fn values(&self) -> BTreeMap<String, MetricValue> {
        self.shared.tables.read().data.clone()
    }

    /// 导出完整的可序列化快照。
    ///
    /// - **契约 (What)**：三个成员取自同一次读锁，彼此一致；
    ///   `errors` 与 `alerts` 为空时整个成员从 JSON 中省略。
    pub fn snapshot(&self) -> StateSnapshot {
        let tables = self.shared.tables.read();
        StateSnapshot {
            state: tables.data.clone(),
            errors: tables.errors.clone(),
            alerts: tables.alerts.snapshot(),
        }
    }

    /// 将一个变更批次整体并入，并在同一写锁内重估全部告警。
    ///
    /// - **契约 (What)**：值按键覆写；错误项 `Some` 归档、`None` 清除；
    ///   无论批次是否触及绑定键，告警表全量重估一遍，空批次亦然。
    pub(crate) fn apply(
        &self,
        values: BTreeMap<String, MetricValue>,
        errors: BTreeMap<String, Option<ProbeError>>,
    ) {
        let mut tables = self.shared.tables.write();
        for (key, value) in values {
            tables.data.insert(key, value);
        }
        for (code, staged) in errors {
            match staged {
                Some(error) => tables.errors.collect(code, error),
                None => {
                    tables.errors.remove(&code);
                }
            }
        }
        let Tables { data, alerts, .. } = &mut *tables;
        alerts.update_all(data);
    }

    /// 直接归档或清除一条采样错误，绕过批次机制。
    ///
    /// 供带外错误收集使用；不触发告警重估，触发位的演进只跟随批次合并。
    pub(crate) fn set_error(&self, code: &str, error: Option<ProbeError>) {
        let mut tables = self.shared.tables.write();
        match error {
            Some(error) => tables.errors.collect(code, error),
            None => {
                tables.errors.remove(code);
            }
        }
    }

    /// 注册或替换绑定在 `key` 上的告警。
    pub(crate) fn add_alert(&self, key: impl Into<String>, alert: Alert) {
        self.shared.tables.write().alerts.insert(key, alert);
    }

    /// 告警触发位的只读查询，供测试与监听器对账。
    pub fn alert_firing(&self, key: &str) -> Option<bool> {
        self.shared.tables.read().alerts.get(key).map(Alert::firing)
    }

    pub(crate) fn value_equals(&self, key: &str, candidate: &MetricValue) -> bool {
        self.shared.tables.read().data.get(key) == Some(candidate)
    }

    pub(crate) fn error_equals(&self, code: &str, candidate: Option<&ProbeError>) -> bool {
        self.shared.tables.read().errors.get(code) == candidate
    }

    fn mismatch(key: &str, expected: ValueKind, actual: &MetricValue) -> TelemetryError {
        TelemetryError::TypeMismatch {
            key: key.to_string(),
            expected,
            actual: actual.kind(),
        }
    }
}

impl Serialize for State {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.snapshot().serialize(serializer)
    }
}
