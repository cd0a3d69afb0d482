use std::collections::BTreeMap;

use crate::error::ProbeError;
use crate::state::State;
use crate::value::MetricValue;

/// 针对 [`State`] 的暂存变更批次。
///
/// # 教案式说明
/// - **意图 (Why)**：探针逐键写入，若每次写都直接落表，监听器将被大量
///   “值没变”的拍子淹没；批次先在私有暂存区收集差异，末尾一次性合并，
///   脏标记让调用方精确知道本批是否产生了实际变更。
/// - **契约 (What)**：
///   - [`set`](Mutation::set) / [`set_error`](Mutation::set_error) 与**实时状态**
///     逐次对照：与当前实时值相等的写入不暂存、不置脏；
///   - 脏标记单调：任何一次实际变更后不再回落，批内后续的等值写入不会撤销
///     已暂存的条目；
///   - [`apply`](Mutation::apply) 消费批次，整批在一次写锁内并入实时状态，
///     并发读者观测不到部分合并；返回值即脏标记。
/// - **执行逻辑 (How)**：值与错误分别暂存在两张 `BTreeMap`；错误条目以
///   `Option` 表达“归档或清除”两种暂存形态；对照读取走实时状态的读锁，
///   批次自身不持有任何锁。
/// - **设计权衡 (Trade-offs)**：对照基准是实时状态而非暂存区，批内两次
///   互相矛盾的写入以“与实时态的差异”为准；浮点 `NaN` 与任何值都不相等，
///   NaN 写入永远视为变更。
#[derive(Debug)]
pub struct Mutation {
    state: State,
    values: BTreeMap<String, MetricValue>,
    errors: BTreeMap<String, Option<ProbeError>>,
    dirty: bool,
}

impl Mutation {
    pub(crate) fn begin(state: State) -> Self {
        Self {
            state,
            values: BTreeMap::new(),
            errors: BTreeMap::new(),
            dirty: false,
        }
    }

    /// 暂存一次值写入；与实时值相等时不产生任何效果。
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        if self.state.value_equals(&key, &value) {
            return self;
        }
        self.dirty = true;
        self.values.insert(key, value);
        self
    }

    /// 暂存一次错误归档（`Some`）或清除（`None`）；与实时错误表相等时不产生任何效果。
    ///
    /// 清除一个本就不存在的错误同样是空写，不会置脏。
    pub fn set_error(&mut self, code: impl Into<String>, error: Option<ProbeError>) -> &mut Self {
        let code = code.into();
        if self.state.error_equals(&code, error.as_ref()) {
            return self;
        }
        self.dirty = true;
        self.errors.insert(code, error);
        self
    }

    /// 本批次是否已包含实际变更。
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// 将整批变更原子并入实时状态，返回脏标记。
    pub fn apply(self) -> bool {
        self.state.apply(self.values, self.errors);
        self.dirty
    }
}
