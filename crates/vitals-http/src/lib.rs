#![deny(unsafe_code)]
#![doc = "vitals-http: 将聚合状态以只读 HTTP 接口对外暴露的薄适配层。"]
#![doc = ""]
#![doc = "== 行为契约 =="]
#![doc = "`GET /state` 返回 200 与状态快照 JSON：`state` 成员必有，`errors`/`alerts` 为空时整体省略。"]
#![doc = "适配层无自有状态、不做缓存：每次请求即时取一份一致性快照后序列化，锁外完成响应编码。"]

use axum::{Json, Router, extract::State as HandlerState, routing::get};
use vitals_core::{State, StateSnapshot};

/// 构造暴露 `GET /state` 的只读路由。
///
/// # 教案式说明
/// - **意图 (Why)**：聚合核心不绑定 HTTP 框架；适配层把 [`State`] 句柄挂为
///   路由共享状态，观测端（仪表盘、巡检脚本）零配置接入。
/// - **契约 (What)**：响应体即 [`State::snapshot`] 的 JSON 形态；返回的
///   `Router` 可经 `merge`/`nest` 并入上层服务，句柄克隆即共享同一状态。
/// - **执行逻辑 (How)**：单路由加 `Json` 响应器；快照在读锁内取出后立即
///   释放，序列化与网络写出全部发生在锁外。
pub fn router(state: &State) -> Router {
    Router::new()
        .route("/state", get(serve_state))
        .with_state(state.clone())
}

async fn serve_state(HandlerState(state): HandlerState<State>) -> Json<StateSnapshot> {
    Json(state.snapshot())
}
