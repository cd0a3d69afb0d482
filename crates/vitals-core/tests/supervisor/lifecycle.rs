pub mod lifecycle {
    //! 生命周期语义：一次性启动、幂等停机、运行期注册。
    //!
    //! # 合同与边界（What）
    //! - 同一监督者 `run` 至多成功一次，停止后同样拒绝再启动；
    //! - `stop` 幂等，且在启动前调用是空操作；
    //! - 循环运行期间的注册与进行中的拍串行化，于下一拍生效。

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::time::sleep;
    use vitals_core::{Mutation, SampleContext, Supervisor, codes, probe_fn};

    #[tokio::test(start_paused = true)]
    async fn run_succeeds_at_most_once_per_supervisor() {
        let supervisor = Supervisor::builder("gateway").build();

        supervisor.run().expect("首次启动应成功");
        let err = supervisor.run().expect_err("运行中重复启动应被拒绝");
        assert_eq!(err.code(), codes::SUPERVISOR_ALREADY_STARTED, "应返回稳定错误码");
        assert_eq!(
            err.to_string(),
            "supervisor `gateway` already started",
            "文案应点名监督者"
        );

        supervisor.stop();
        assert!(supervisor.run().is_err(), "已停止的实例需要新实例才能再次采样");
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_safe_before_run() {
        let supervisor = Supervisor::builder("gateway").build();

        // 启动前的停机是空操作，不得把实例带入“已取消”状态。
        supervisor.stop();
        supervisor.run().expect("先停后启中的启动应成功");

        supervisor.stop();
        supervisor.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stopping_halts_future_ticks() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let hits = ticks.clone();
        let supervisor = Supervisor::builder("gateway")
            .sampling_interval(Duration::from_secs(1))
            .build();
        supervisor
            .add_probe(
                "pulse",
                Duration::ZERO,
                probe_fn(move |_: &SampleContext, _: &mut Mutation| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        supervisor.run().expect("启动采样循环");
        sleep(Duration::from_millis(1100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1, "停机前应完成一拍");

        supervisor.stop();
        sleep(Duration::from_secs(5)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1, "停机后不得再有采样拍");
    }

    #[tokio::test(start_paused = true)]
    async fn probes_registered_while_running_join_the_next_tick() {
        let supervisor = Supervisor::builder("gateway")
            .sampling_interval(Duration::from_secs(1))
            .build();
        supervisor.run().expect("启动采样循环");

        sleep(Duration::from_millis(500)).await;
        supervisor
            .add_probe(
                "temp",
                Duration::ZERO,
                probe_fn(|_: &SampleContext, mutation: &mut Mutation| {
                    mutation.set("temp", 42);
                }),
            )
            .await;

        sleep(Duration::from_millis(600)).await;
        assert_eq!(
            supervisor.state().integer("temp").unwrap(),
            42,
            "运行期注册的探针应从下一拍开始采样"
        );
        supervisor.stop();
    }
}
