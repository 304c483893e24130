//! End-to-end runs over small gzip fixtures built in a temp directory.

use std::io::Write;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tickpack_core::config::OutputLayout;
use tickpack_core::{Config, Error, TickerOutcome};
use tickpack_pipeline::run_pipeline;
use tokio_util::sync::CancellationToken;

fn date_dir(root: &Path, ticker: &str, date: &str) -> PathBuf {
    let dir = root
        .join("data")
        .join(ticker)
        .join("spot")
        .join("orderbooks")
        .join(date);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_gz(path: &Path, rows: &[&str]) {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    for row in rows {
        writeln!(encoder, "{row}").unwrap();
    }
    std::fs::write(path, encoder.finish().unwrap()).unwrap();
}

fn config(root: &Path, output: &str) -> Config {
    let mut config = Config::default();
    config.input.root = root.join("data");
    config.output.root = root.join(output);
    config.archive.path = root.join(format!("{output}.tar.gz"));
    config
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_make_take_scenario_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let day = date_dir(dir.path(), "BTC_USDT", "2022-01-02");
    write_gz(
        &day.join("BTC_USDT-orderbooks-2022010200.csv.gz"),
        &[
            "100,bid,make,50,1.0,id-1,0",
            "100,ask,take,50,2.0,id-2,0",
        ],
    );

    let report = run_pipeline(config(dir.path(), "parsed_data"), CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.tickers.len(), 1);
    assert_eq!(report.tickers[0].files_processed, 1);
    assert_eq!(report.tickers[0].lines_written, 2);

    let lines = read_lines(&dir.path().join("parsed_data/tick_BTCUSDT_20220102.txt"));
    assert_eq!(
        lines,
        vec![
            "1970-01-01 00:01:40.000000,1970-01-01 00:01:40.000000,id-2,P,IEX,1,50,1.000000,,,,0",
            "1970-01-01 00:01:40.000000,1970-01-01 00:01:40.000000,id-2,P,IEX,2,50,2.000000,,,,0",
        ]
    );
    assert_eq!(report.archive, Some(dir.path().join("parsed_data.tar.gz")));
    assert!(dir.path().join("parsed_data.tar.gz").is_file());
}

#[tokio::test]
async fn test_files_append_in_sorted_order() {
    let dir = tempfile::tempdir().unwrap();
    let day = date_dir(dir.path(), "ETH_USDT", "2022-01-02");
    // Written out of order on purpose.
    write_gz(&day.join("ETH_USDT-orderbooks-2022010201.csv.gz"), &["1641085200.4,bid,make,3000.5,1,second,0"]);
    write_gz(&day.join("ETH_USDT-orderbooks-2022010200.csv.gz"), &["1641081600,bid,make,2999.0,1,first,0"]);
    std::fs::write(day.join("README.txt"), "not a log").unwrap();

    let report = run_pipeline(config(dir.path(), "parsed_data"), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.tickers[0].files_processed, 2);

    let lines = read_lines(&dir.path().join("parsed_data/tick_ETHUSDT_20220102.txt"));
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("2022-01-02 00:00:00.000000,2022-01-02 00:00:00.000000,first,"));
    assert!(lines[1].starts_with("2022-01-02 01:00:00.400000,2022-01-02 01:00:00.400000,second,"));
}

#[tokio::test]
async fn test_rerun_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    for (ticker, base) in [("BTC_USDT", 46000), ("ETH_USDT", 3000), ("SOL_USDT", 170)] {
        for date in ["2022-01-02", "2022-01-03"] {
            let day = date_dir(dir.path(), ticker, date);
            for hour in 0..3 {
                let rows: Vec<String> = (0..50)
                    .map(|i| {
                        let action = ["make", "take", "set"][i % 3];
                        format!(
                            "1641085{:03}.{},bid,{},{}.{},0.{},{}-{},0",
                            hour * 100 + i / 4,
                            i % 10,
                            action,
                            base + i % 7,
                            i % 5,
                            i + 1,
                            hour,
                            i
                        )
                    })
                    .collect();
                let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
                write_gz(&day.join(format!("{ticker}-orderbooks-{hour:02}.csv.gz")), &rows);
            }
        }
    }

    let first = run_pipeline(config(dir.path(), "first"), CancellationToken::new())
        .await
        .unwrap();
    let second = run_pipeline(config(dir.path(), "second"), CancellationToken::new())
        .await
        .unwrap();
    assert!(first.is_success() && second.is_success());
    assert_eq!(first.total_lines(), second.total_lines());
    assert!(first.total_lines() > 0);

    let mut names: Vec<_> = std::fs::read_dir(dir.path().join("first"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    names.sort();
    assert_eq!(names.len(), 6);
    for name in names {
        let a = std::fs::read(dir.path().join("first").join(&name)).unwrap();
        let b = std::fs::read(dir.path().join("second").join(&name)).unwrap();
        assert_eq!(a, b, "{name:?} differs between runs");
    }
}

#[tokio::test]
async fn test_corrupt_file_is_skipped_siblings_processed() {
    let dir = tempfile::tempdir().unwrap();
    let day = date_dir(dir.path(), "BTC_USDT", "2022-01-02");
    write_gz(&day.join("a-00.csv.gz"), &["100,bid,make,50,1,a,0"]);
    std::fs::write(day.join("a-01.csv.gz"), "100,bid,make,51,1,b,0\n").unwrap();
    write_gz(&day.join("a-02.csv.gz"), &["100,bid,make,52,1,c,0", "101,bid,make,52,oops,d,0"]);

    let report = run_pipeline(config(dir.path(), "parsed_data"), CancellationToken::new())
        .await
        .unwrap();
    let ticker = &report.tickers[0];

    assert_eq!(ticker.outcome, TickerOutcome::Completed);
    assert_eq!(ticker.files_processed, 2);
    assert_eq!(ticker.skipped_files.len(), 1);
    assert_eq!(ticker.skipped_files[0].path, day.join("a-01.csv.gz"));
    assert!(ticker.skipped_files[0].reason.contains("Decompression"));
    assert_eq!(ticker.rows_skipped, 1);

    let lines = read_lines(&dir.path().join("parsed_data/tick_BTCUSDT_20220102.txt"));
    let prices: Vec<_> = lines.iter().map(|l| l.split(',').nth(6).unwrap()).collect();
    assert_eq!(prices, vec!["50", "52"]);
}

#[tokio::test]
async fn test_slow_file_times_out_siblings_processed() {
    let dir = tempfile::tempdir().unwrap();
    let day = date_dir(dir.path(), "BTC_USDT", "2022-01-02");

    // Far more rows than can be folded inside the budget below.
    let mut slow = GzEncoder::new(Vec::new(), Compression::fast());
    for i in 0..300_000u64 {
        writeln!(
            slow,
            "{}.{},bid,make,{},1,{},0",
            1641081600 + i / 10,
            i % 10,
            1000 + i % 500,
            i
        )
        .unwrap();
    }
    std::fs::write(day.join("a-00.csv.gz"), slow.finish().unwrap()).unwrap();
    write_gz(&day.join("a-01.csv.gz"), &["100,bid,make,50,1,quick,0"]);

    let mut config = config(dir.path(), "parsed_data");
    config.scheduler.file_timeout_secs = 0.05;
    config.archive.enabled = false;

    let report = run_pipeline(config, CancellationToken::new()).await.unwrap();
    let ticker = &report.tickers[0];

    assert_eq!(ticker.outcome, TickerOutcome::Completed);
    assert_eq!(ticker.files_processed, 1);
    assert_eq!(ticker.skipped_files.len(), 1);
    assert_eq!(ticker.skipped_files[0].path, day.join("a-00.csv.gz"));
    assert!(ticker.skipped_files[0].reason.contains("Timed out"));

    let lines = read_lines(&dir.path().join("parsed_data/tick_BTCUSDT_20220102.txt"));
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(",quick,"));
}

#[tokio::test]
async fn test_colliding_output_names_fail_later_ticker() {
    let dir = tempfile::tempdir().unwrap();
    for (ticker, id) in [("BTC_USDT", "underscore"), ("BTC-USDT", "dash")] {
        let day = date_dir(dir.path(), ticker, "2022-01-02");
        let row = format!("100,bid,make,50,1,{id},0");
        write_gz(&day.join("x.csv.gz"), &[row.as_str()]);
    }

    let report = run_pipeline(config(dir.path(), "parsed_data"), CancellationToken::new())
        .await
        .unwrap();

    let by_name = |name: &str| report.tickers.iter().find(|t| t.ticker == name).unwrap();
    assert_eq!(by_name("BTC-USDT").outcome, TickerOutcome::Completed);
    match &by_name("BTC_USDT").outcome {
        TickerOutcome::Failed { error } => assert!(error.contains("BTC-USDT")),
        other => panic!("unexpected outcome {other:?}"),
    }

    let lines = read_lines(&dir.path().join("parsed_data/tick_BTCUSDT_20220102.txt"));
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains(",dash,"));
}

#[tokio::test]
async fn test_failed_ticker_does_not_stop_siblings() {
    let dir = tempfile::tempdir().unwrap();
    let day = date_dir(dir.path(), "GOOD_USDT", "2022-01-02");
    write_gz(&day.join("g-00.csv.gz"), &["100,bid,make,50,1,a,0"]);
    // Ticker directory without the spot/orderbooks tree.
    std::fs::create_dir_all(dir.path().join("data").join("EMPTY_USDT")).unwrap();
    // Output for this ticker is blocked by a plain file where its directory should be.
    let blocked = date_dir(dir.path(), "BLOCKED_USDT", "2022-01-02");
    write_gz(&blocked.join("b-00.csv.gz"), &["100,bid,make,50,1,a,0"]);

    let mut config = config(dir.path(), "parsed_data");
    config.output.layout = OutputLayout::PerTicker;
    std::fs::create_dir_all(&config.output.root).unwrap();
    std::fs::write(config.output.root.join("BLOCKEDUSDT"), "in the way").unwrap();

    let report = run_pipeline(config, CancellationToken::new()).await.unwrap();
    assert!(!report.is_success());

    let by_name = |name: &str| report.tickers.iter().find(|t| t.ticker == name).unwrap();
    assert_eq!(by_name("GOOD_USDT").outcome, TickerOutcome::Completed);
    assert_eq!(by_name("GOOD_USDT").lines_written, 1);
    match &by_name("EMPTY_USDT").outcome {
        TickerOutcome::Failed { error } => assert!(error.contains("Cannot access")),
        other => panic!("unexpected outcome {other:?}"),
    }
    match &by_name("BLOCKED_USDT").outcome {
        TickerOutcome::Failed { error } => assert!(error.contains("Cannot write")),
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(dir
        .path()
        .join("parsed_data/GOODUSDT/tick_GOODUSDT_20220102.txt")
        .is_file());
}

#[tokio::test]
async fn test_single_slot_processes_every_ticker() {
    let dir = tempfile::tempdir().unwrap();
    for ticker in ["A_USDT", "B_USDT", "C_USDT", "D_USDT"] {
        let day = date_dir(dir.path(), ticker, "2022-01-02");
        write_gz(&day.join("x.csv.gz"), &["100,bid,take,50,1,a,0"]);
    }
    let mut config = config(dir.path(), "parsed_data");
    config.scheduler.max_concurrent_tickers = 1;
    config.archive.enabled = false;

    let report = run_pipeline(config, CancellationToken::new()).await.unwrap();
    let names: Vec<_> = report.tickers.iter().map(|t| t.ticker.as_str()).collect();
    assert_eq!(names, vec!["A_USDT", "B_USDT", "C_USDT", "D_USDT"]);
    assert!(report.is_success());
    assert_eq!(report.total_lines(), 4);
    assert_eq!(report.archive, None);
}

#[tokio::test]
async fn test_non_date_folders_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let day = date_dir(dir.path(), "BTC_USDT", "2022-01-02");
    write_gz(&day.join("x.csv.gz"), &["100,bid,make,50,1,a,0"]);
    let stray = date_dir(dir.path(), "BTC_USDT", "tmp");
    write_gz(&stray.join("x.csv.gz"), &["100,bid,make,50,1,a,0"]);

    let report = run_pipeline(config(dir.path(), "parsed_data"), CancellationToken::new())
        .await
        .unwrap();
    assert!(report.is_success());
    assert_eq!(report.tickers[0].files_processed, 1);
}

#[tokio::test]
async fn test_cancelled_run_starts_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let day = date_dir(dir.path(), "BTC_USDT", "2022-01-02");
    write_gz(&day.join("x.csv.gz"), &["100,bid,make,50,1,a,0"]);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = run_pipeline(config(dir.path(), "parsed_data"), cancel).await.unwrap();

    assert_eq!(report.tickers[0].outcome, TickerOutcome::Cancelled);
    assert_eq!(report.archive, None);
    assert!(!dir.path().join("parsed_data").exists());
}

#[tokio::test]
async fn test_missing_input_root_fails_run() {
    let dir = tempfile::tempdir().unwrap();
    let err = run_pipeline(config(dir.path(), "parsed_data"), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InputAccess { .. }));
}

#[tokio::test]
async fn test_invalid_config_fails_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), "parsed_data");
    config.scheduler.max_concurrent_tickers = 0;
    let err = run_pipeline(config, CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
