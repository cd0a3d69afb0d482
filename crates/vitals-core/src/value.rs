use core::fmt;

use serde::{Deserialize, Serialize};

/// 遥测值的封闭标量类型集合。
///
/// # 教案式说明
/// - **意图 (Why)**：探针写入状态的值只允许四种标量，用封闭枚举取代“任意动态值”，
///   使类型不匹配在读取端呈现为可编程的错误而非运行期惊喜。
/// - **契约 (What)**：
///   - 变体即全集：整数、浮点、布尔、文本，不存在嵌套结构；
///   - 序列化采用 `untagged` 表示，JSON 中呈现为裸标量（`42`、`3.5`、`true`、`"ok"`）；
///   - 变体声明顺序保证 `untagged` 反序列化优先命中整数再尝试浮点。
/// - **执行逻辑 (How)**：`From` 覆盖常用原生类型，探针侧写 `mutation.set("k", 42)` 即可；
///   `kind` 暴露变体的类别标签，供类型不匹配诊断拼装稳定文案。
/// - **设计权衡 (Trade-offs)**：不提供 `Duration`/字节串等扩展变体，聚合器只面向
///   可直接落盘与展示的标量；复合数据应拆成多个键。
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

/// 标量类别标签，用于类型不匹配诊断。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl MetricValue {
    /// 返回值所属的类别标签。
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Integer(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Float,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Text(_) => ValueKind::Text,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

impl fmt::Display for MetricValue {
    /// 面向展示的字符串表示。
    ///
    /// - **契约 (What)**：整数与布尔使用标准字面量；文本原样输出；
    ///   浮点缩短为两位有效数字（`3.14159` -> `"3.1"`，`100.0` -> `"1e+02"`），
    ///   仪表盘场景下短文本优先于全精度。
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => f.write_str(&format_float_short(*v)),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<bool> for MetricValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// 将浮点缩短为两位有效数字的展示形式。
///
/// 规则与通用 `%g` 风格一致：十进制指数落在 `[-4, 2)` 时使用定点写法并裁剪
/// 尾部零，否则使用 `d.de±XX` 科学计数（指数至少两位）；NaN 与无穷原样透传。
fn format_float_short(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() {
            "-0".to_string()
        } else {
            "0".to_string()
        };
    }

    // 先按两位有效数字取科学计数表示，指数以舍入后的值为准，
    // 避免 99.5 这类进位样本被错误归入定点分支。
    let scientific = format!("{value:.1e}");
    let (mantissa, exponent) = scientific
        .split_once('e')
        .unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= 2 {
        let mantissa = trim_fraction(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        return format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs());
    }

    let fraction_digits = (1 - exponent).max(0) as usize;
    trim_fraction(&format!("{value:.fraction_digits$}")).to_string()
}

/// 裁剪小数部分的尾部零，随后裁剪孤立的小数点。
fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
