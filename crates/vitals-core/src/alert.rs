use core::fmt;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::value::MetricValue;

/// 告警触发条件的判定接口。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合核心不内置任何阈值规则引擎，触发逻辑完全由调用方提供；
///   以单方法 trait 表达“给定当前值，是否触发”，并为闭包提供毯式实现。
/// - **契约 (What)**：`current` 为告警绑定键的当前值，键尚未写入时为 `None`；
///   实现必须 `Send + Sync`，判定在状态写锁内同步执行，不得阻塞或重入状态。
/// - **设计权衡 (Trade-offs)**：不传入完整状态视图，避免条件闭包在锁内读锁重入；
///   跨键条件应由探针预先聚合出一个派生键。
pub trait AlertCondition: Send + Sync {
    /// 判定当前值是否触发告警。
    fn triggered(&self, current: Option<&MetricValue>) -> bool;
}

impl<F> AlertCondition for F
where
    F: Fn(Option<&MetricValue>) -> bool + Send + Sync,
{
    fn triggered(&self, current: Option<&MetricValue>) -> bool {
        self(current)
    }
}

/// 绑定在单个状态键上的告警：一段文案、一个条件、一个触发位。
///
/// # 教案式说明
/// - **意图 (Why)**：告警是状态的衍生视图而非独立系统，仅维护“当前是否触发”
///   这一位信息，展示端据此渲染红绿灯。
/// - **契约 (What)**：`firing` 只在状态合并完成后的统一评估里更新；
///   评估覆盖全部已注册告警，与本次合并是否触及绑定键无关。
/// - **设计权衡 (Trade-offs)**：不记录触发历史与翻转时间戳，需要事件流的场景
///   应在监听器里自行对比快照。
pub struct Alert {
    message: String,
    condition: Box<dyn AlertCondition>,
    firing: bool,
}

impl Alert {
    /// 以展示文案与触发条件构造告警，初始为未触发。
    pub fn new(message: impl Into<String>, condition: impl AlertCondition + 'static) -> Self {
        Self {
            message: message.into(),
            condition: Box::new(condition),
            firing: false,
        }
    }

    /// 返回展示文案。
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 返回当前是否触发。
    pub fn firing(&self) -> bool {
        self.firing
    }

    /// 以绑定键的当前值重新判定触发位。
    pub(crate) fn update(&mut self, current: Option<&MetricValue>) {
        self.firing = self.condition.triggered(current);
    }

    /// 导出可序列化的只读视图。
    pub fn snapshot(&self) -> AlertSnapshot {
        AlertSnapshot {
            message: self.message.clone(),
            firing: self.firing,
        }
    }
}

impl fmt::Debug for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alert")
            .field("message", &self.message)
            .field("firing", &self.firing)
            .finish_non_exhaustive()
    }
}

/// 告警的可序列化只读视图。
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AlertSnapshot {
    pub message: String,
    pub firing: bool,
}

/// 按绑定键归档的告警表。
///
/// # 教案式说明
/// - **意图 (Why)**：把“绑定键 -> 告警”的归属关系集中到一张表里，
///   状态合并后对整表做一次确定性评估，评估顺序即键的字典序。
/// - **契约 (What)**：同键重复注册执行整体替换；评估以绑定键的当前值为输入，
///   键缺失时传入 `None`，条件可借此表达“探针从未上报”类告警。
#[derive(Debug, Default)]
pub struct Alerts {
    entries: BTreeMap<String, Alert>,
}

impl Alerts {
    /// 创建空表。
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册或替换绑定在 `key` 上的告警。
    pub fn insert(&mut self, key: impl Into<String>, alert: Alert) {
        self.entries.insert(key.into(), alert);
    }

    /// 查询绑定在 `key` 上的告警。
    pub fn get(&self, key: &str) -> Option<&Alert> {
        self.entries.get(key)
    }

    /// 表是否为空。
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 表内的告警数量。
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 以当前数据表重新评估全部告警。
    pub(crate) fn update_all(&mut self, data: &BTreeMap<String, MetricValue>) {
        for (key, alert) in &mut self.entries {
            alert.update(data.get(key));
        }
    }

    /// 导出 `key -> 视图` 的可序列化映射。
    pub fn snapshot(&self) -> BTreeMap<String, AlertSnapshot> {
        self.entries
            .iter()
            .map(|(key, alert)| (key.clone(), alert.snapshot()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(key: &str, value: MetricValue) -> BTreeMap<String, MetricValue> {
        let mut map = BTreeMap::new();
        map.insert(key.to_string(), value);
        map
    }

    #[test]
    fn update_all_flips_firing_in_both_directions() {
        let mut alerts = Alerts::new();
        alerts.insert(
            "temp",
            Alert::new("temperature too high", |current: Option<&MetricValue>| {
                matches!(current, Some(MetricValue::Integer(v)) if *v > 90)
            }),
        );

        alerts.update_all(&data("temp", MetricValue::Integer(95)));
        assert!(alerts.get("temp").unwrap().firing(), "超过阈值后应触发");

        alerts.update_all(&data("temp", MetricValue::Integer(42)));
        assert!(!alerts.get("temp").unwrap().firing(), "回落后触发位应清除");
    }

    #[test]
    fn missing_key_is_passed_as_none() {
        let mut alerts = Alerts::new();
        alerts.insert(
            "heartbeat",
            Alert::new("probe never reported", |current: Option<&MetricValue>| {
                current.is_none()
            }),
        );

        alerts.update_all(&BTreeMap::new());
        assert!(
            alerts.get("heartbeat").unwrap().firing(),
            "绑定键缺失时条件应收到 None"
        );

        alerts.update_all(&data("heartbeat", MetricValue::Boolean(true)));
        assert!(!alerts.get("heartbeat").unwrap().firing(), "键出现后告警应解除");
    }

    #[test]
    fn snapshot_serializes_message_and_firing() {
        let mut alerts = Alerts::new();
        alerts.insert(
            "disk",
            Alert::new("disk almost full", |_: Option<&MetricValue>| true),
        );
        alerts.update_all(&BTreeMap::new());

        assert_eq!(
            serde_json::to_value(alerts.snapshot()).unwrap(),
            serde_json::json!({
                "disk": { "message": "disk almost full", "firing": true }
            }),
            "视图应序列化为 key -> {{message, firing}} 映射"
        );
    }

    #[test]
    fn insert_replaces_same_key_registration() {
        let mut alerts = Alerts::new();
        alerts.insert("disk", Alert::new("old", |_: Option<&MetricValue>| true));
        alerts.insert("disk", Alert::new("new", |_: Option<&MetricValue>| false));

        assert_eq!(alerts.len(), 1, "同键注册应整体替换");
        assert_eq!(alerts.get("disk").unwrap().message(), "new", "应保留最后一次注册");
    }
}
