//! 采样循环集成测试入口，验证监督者在真实 Tokio 节拍下的端到端行为。
//!
//! # 模块目的（Why）
//! - 汇集监督者循环相关的集成测试，便于统一运行与过滤；
//! - 对齐验收命令 `cargo test -p vitals-core --test supervisor` 的过滤路径。
//!
//! # 结构概览（What）
//! - [`tests::supervisor::sampling_loop`]：真实循环下的采样、脏拍通知与落盘移交。
//! - [`tests::supervisor::lifecycle`]：启动与停机的一次性生命周期语义。
//!
//! # 维护提示（How）
//! - 新增循环相关集成测试时，请新建子文件并在此处补一行 `include!`；
//! - 测试一律使用 `start_paused` 虚拟时间推进节拍，避免真实定时器抖动导致偶发失败。

pub mod tests {
    //! 集成测试命名空间：将监督者相关测试归档在 `tests::supervisor` 之下，便于过滤。
    pub mod supervisor {
        //! 监督者调度契约的集成测试集合。
        include!("sampling_loop.rs");
        include!("lifecycle.rs");
    }
}
