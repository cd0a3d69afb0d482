//! 网关体征控制台：在本机跑一个完整的采样循环，并经 HTTP 暴露状态快照。
//!
//! # 使用方法
//! ```bash
//! RUST_LOG=info cargo run --bin gateway_console
//! curl http://127.0.0.1:8080/state | jq
//! ```
//! - 进程每秒采样一批合成指标（活跃连接数、队列水位、证书剩余天数）；
//! - 队列水位越过 80 时 `queue.depth` 告警点亮，回落后自动熄灭；
//! - `Ctrl-C` 触发停机：先关闭 HTTP 服务，再停掉采样循环。
//!
//! # 设计要点（Why）
//! - 探针全部产出进程内合成数据，演示不依赖任何外部采集源；
//! - 落盘后端以日志行代替真实时序库，每拍打印一条移交记录；
//! - HTTP 适配层与采样循环共享同一个 `State` 句柄，读取不阻塞采样。

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vitals_core::{
    Alert, MetricValue, Mutation, PersistenceSink, SampleContext, SinkError, State, Supervisor,
    async_trait, probe_fn,
};

/// 以结构化日志代替真实时序库写出的演示后端。
struct LogSink;

#[async_trait]
impl PersistenceSink for LogSink {
    async fn save(
        &self,
        bucket: &str,
        name: &str,
        fields: &BTreeMap<String, MetricValue>,
        _tags: &BTreeMap<String, String>,
    ) -> Result<(), SinkError> {
        info!(bucket, name, fields = fields.len(), "移交状态快照");
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("网关控制台退出: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let supervisor = Supervisor::builder("gateway")
        .sampling_interval(Duration::from_secs(1))
        .sink(LogSink)
        .build();

    // 合成指标：连接数走锯齿波，队列水位周期性越过告警阈值。
    let mut round: i64 = 0;
    supervisor
        .add_probe(
            "traffic",
            Duration::ZERO,
            probe_fn(move |_: &SampleContext, mutation: &mut Mutation| {
                round += 1;
                mutation.set("connections.active", 120 + round % 40);
                mutation.set("queue.depth", (round * 17) % 100);
            }),
        )
        .await;
    supervisor
        .add_probe(
            "cert",
            Duration::from_secs(3600),
            probe_fn(|_: &SampleContext, mutation: &mut Mutation| {
                mutation.set("cert.days_left", 42);
            }),
        )
        .await;
    supervisor
        .add_alert(
            "queue.depth",
            Alert::new("queue depth above 80", |current: Option<&MetricValue>| {
                matches!(current, Some(MetricValue::Integer(depth)) if *depth > 80)
            }),
        )
        .await;
    supervisor
        .add_listener(|state: &State| {
            info!(
                connections = state.integer("connections.active").unwrap_or_default(),
                queue_alert = ?state.alert_firing("queue.depth"),
                "状态发生变更"
            );
        })
        .await;

    supervisor.run()?;

    let app = vitals_http::router(&supervisor.state());
    let listener = TcpListener::bind("127.0.0.1:8080").await?;
    info!(addr = %listener.local_addr()?, "状态快照服务已就绪");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await?;

    supervisor.stop();
    info!("采样循环已停机");
    Ok(())
}
