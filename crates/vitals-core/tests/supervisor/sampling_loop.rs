pub mod sampling_loop {
    //! 真实循环行为：节拍驱动、脏拍通知、逐拍落盘移交。
    //!
    //! # 合同与边界（What）
    //! - 首拍在一个完整采样间隔后触发，探针写入经批次原子合并后对监听器可见；
    //! - 值未变化的后续拍保持监听器沉默，但落盘移交每拍发生；
    //! - 带外归档的错误在无探针触碰时跨拍存活，并出现在快照 JSON 中。

    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex;
    use tokio::time::sleep;
    use vitals_core::{
        MetricValue, Mutation, PERSIST_BUCKET, PersistenceSink, ProbeError, SampleContext,
        SinkError, State, Supervisor, async_trait, probe_fn,
    };

    #[derive(Clone, Default)]
    struct MemorySink {
        saves: Arc<Mutex<Vec<(String, String, BTreeMap<String, MetricValue>)>>>,
    }

    #[async_trait]
    impl PersistenceSink for MemorySink {
        async fn save(
            &self,
            bucket: &str,
            name: &str,
            fields: &BTreeMap<String, MetricValue>,
            _tags: &BTreeMap<String, String>,
        ) -> Result<(), SinkError> {
            self.saves
                .lock()
                .push((bucket.to_string(), name.to_string(), fields.clone()));
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn the_loop_samples_and_notifies_end_to_end() {
        let supervisor = Supervisor::builder("gateway")
            .sampling_interval(Duration::from_secs(1))
            .build();
        supervisor
            .add_probe(
                "temp",
                Duration::ZERO,
                probe_fn(|_: &SampleContext, mutation: &mut Mutation| {
                    mutation.set("temp", 42);
                }),
            )
            .await;

        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        supervisor
            .add_listener(move |state: &State| {
                assert_eq!(state.integer("temp").unwrap(), 42, "监听器应看到合并后的状态");
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        supervisor.run().expect("启动采样循环");

        // 首拍落在 +1s，推进到 1.5s 保证其完成。
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(supervisor.state().integer("temp").unwrap(), 42, "首拍采样值应落表");
        assert_eq!(notified.load(Ordering::SeqCst), 1, "首拍是脏拍，应通知一次");

        // 再推进两拍：探针重写同值，批次干净，监听器保持沉默。
        sleep(Duration::from_secs(2)).await;
        assert_eq!(notified.load(Ordering::SeqCst), 1, "干净拍不得重复通知");

        supervisor.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn the_sink_is_handed_a_snapshot_every_tick() {
        let sink = MemorySink::default();
        let supervisor = Supervisor::builder("gateway")
            .sampling_interval(Duration::from_secs(1))
            .sink(sink.clone())
            .build();
        supervisor
            .add_probe(
                "temp",
                Duration::ZERO,
                probe_fn(|_: &SampleContext, mutation: &mut Mutation| {
                    mutation.set("temp", 42);
                }),
            )
            .await;

        supervisor.run().expect("启动采样循环");
        sleep(Duration::from_millis(3200)).await;
        supervisor.stop();

        let saves = sink.saves.lock();
        assert_eq!(saves.len(), 3, "三个节拍应产生三次移交，与是否有变更无关");
        for (bucket, name, fields) in saves.iter() {
            assert_eq!(bucket, PERSIST_BUCKET, "桶名应为统一常量");
            assert_eq!(name, "gateway", "测点名应为监督者名");
            assert_eq!(
                fields.get("temp"),
                Some(&MetricValue::Integer(42)),
                "每次移交都应携带完整数据表快照"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_band_errors_survive_idle_ticks_and_serialize() {
        let supervisor = Supervisor::builder("gateway")
            .sampling_interval(Duration::from_secs(1))
            .build();
        supervisor
            .collect_error("startup.selfcheck", Some(ProbeError::new("config missing")))
            .await;

        supervisor.run().expect("启动采样循环");
        // 没有注册任何探针：两个空拍不得抹掉带外错误。
        sleep(Duration::from_millis(2500)).await;
        supervisor.stop();

        assert!(supervisor.state().has_errors(), "空拍不得清除带外错误");
        let json = serde_json::to_value(supervisor.state()).expect("快照应可序列化");
        assert_eq!(
            json,
            serde_json::json!({
                "state": {},
                "errors": { "startup.selfcheck": "config missing" },
            }),
            "快照应呈现错误成员并省略空的告警成员"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn slow_metrics_are_sampled_on_their_own_cadence() {
        let sampled = Arc::new(AtomicUsize::new(0));
        let hits = sampled.clone();
        let supervisor = Supervisor::builder("gateway")
            .sampling_interval(Duration::from_secs(1))
            .build();
        supervisor
            .add_probe(
                "cert",
                Duration::from_millis(2500),
                probe_fn(move |_: &SampleContext, mutation: &mut Mutation| {
                    let round = hits.fetch_add(1, Ordering::SeqCst) as i64;
                    mutation.set("cert.checks", round + 1);
                }),
            )
            .await;

        supervisor.run().expect("启动采样循环");
        // 节拍在 1s/2s/3s/4s；间隔 2.5s 的指标应只在 1s（首采）与 4s（严格超过 1s+2.5s）采样。
        sleep(Duration::from_millis(4200)).await;
        supervisor.stop();

        assert_eq!(sampled.load(Ordering::SeqCst), 2, "慢指标应按自身间隔向上对齐到节拍");
        assert_eq!(supervisor.state().integer("cert.checks").unwrap(), 2, "第二次采样的值应落表");
    }
}
