use workline::WorkingQueue;
use workline::config::Config;

// One test, so the env mutations cannot race each other.
#[test]
fn config_from_env_reads_and_validates() {
    unsafe {
        std::env::remove_var("WORKLINE_CONCURRENCY");
        std::env::remove_var("LOG_LEVEL");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.default_concurrency, workline::DEFAULT_CONCURRENCY);
    assert_eq!(config.log_level, "info");

    unsafe {
        std::env::set_var("WORKLINE_CONCURRENCY", "8");
        std::env::set_var("LOG_LEVEL", "debug");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.default_concurrency, 8);
    assert_eq!(config.log_level, "debug");
    assert_eq!(WorkingQueue::from_config(&config).concurrency(), 8);

    unsafe {
        std::env::set_var("WORKLINE_CONCURRENCY", "lots");
    }
    assert!(Config::from_env().is_err());

    // Clean up
    unsafe {
        std::env::remove_var("WORKLINE_CONCURRENCY");
        std::env::remove_var("LOG_LEVEL");
    }
}
