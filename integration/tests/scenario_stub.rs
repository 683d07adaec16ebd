use integration::stub::{script, Reply, StubTarget};
use limitprobe::dispatch::Batch;
use limitprobe::error::HarnessError;
use limitprobe::probe::Prober;
use limitprobe::scenario::{probe_serially, run_overlapping, Scenario};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[tokio::test]
async fn steady_rounds_probe_every_key_each_round() {
    // Per key: first arrival of each round accepted, second rejected.
    let replies = [
        Reply::ok(),
        Reply::rejected(),
        Reply::ok(),
        Reply::rejected(),
        Reply::ok(),
        Reply::rejected(),
    ];
    let stub = StubTarget::start(script(&[("/0", &replies), ("/1", &replies)])).await;
    let prober = Prober::new(stub.base_url()).unwrap();

    let gap = Duration::from_millis(200);
    let scenario = Scenario::steady(&["/0", "/1"], 2, 3, gap);
    let started = Instant::now();
    let results = scenario.run(&prober).await.unwrap();

    // Two explicit waits must have elapsed.
    assert!(started.elapsed() >= 2 * gap);
    assert_eq!(results.len(), 12);
    for round in results.chunks(4) {
        for key in ["/0", "/1"] {
            let of_key: Vec<_> = round.iter().filter(|r| r.key == key).collect();
            assert_eq!(of_key.len(), 2);
            assert_eq!(of_key.iter().filter(|r| r.is_accepted()).count(), 1);
        }
    }
}

#[tokio::test]
async fn scenario_aborts_on_first_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let prober = Prober::new(&format!("http://{addr}")).unwrap();
    let scenario = Scenario::steady(&["/0"], 2, 3, Duration::from_millis(50));
    let error = scenario.run(&prober).await.unwrap_err();

    assert!(matches!(error, HarnessError::Transport(_)));
}

#[tokio::test]
async fn overlapping_stages_combine_into_one_result_set() {
    let stub = StubTarget::start(HashMap::new()).await;
    let prober = Prober::new(stub.base_url()).unwrap();

    let stages = vec![
        Batch::single("/x", 5),
        Batch::of(&[("/1", 1), ("/2", 1), ("/3", 1), ("/4", 1), ("/5", 1)]),
        Batch::single("/x", 5),
    ];
    let results = run_overlapping(&prober, stages, Duration::from_millis(100))
        .await
        .unwrap();

    assert_eq!(results.len(), 15);
    assert_eq!(results.iter().filter(|r| r.key == "/x").count(), 10);
    for key in ["/1", "/2", "/3", "/4", "/5"] {
        assert_eq!(results.iter().filter(|r| r.key == key).count(), 1);
    }
}

#[tokio::test]
async fn serial_probing_visits_keys_in_order() {
    let stub = StubTarget::start(HashMap::new()).await;
    let prober = Prober::new(stub.base_url()).unwrap();

    let keys = ["/1", "/2", "/3"];
    let results = probe_serially(&prober, &keys).await.unwrap();

    let visited: Vec<&str> = results.iter().map(|r| r.key.as_str()).collect();
    assert_eq!(visited, keys);
    for pair in results.windows(2) {
        assert!(pair[0].start <= pair[1].start);
    }
}
