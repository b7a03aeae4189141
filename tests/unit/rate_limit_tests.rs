// ==============================
// tests/unit/rate_limit_tests.rs
// ==============================
//! Login lockout behaviour of `AuthRateLimiter`
use std::time::Duration;

use backend_lib::auth::AuthRateLimiter;

#[test]
fn test_rate_limiter_allows_initial_attempts() {
    let rate_limiter = AuthRateLimiter::default();
    assert!(rate_limiter.check_rate_limit("127.0.0.1"));
}

#[test]
fn test_rate_limiter_blocks_after_max_attempts() {
    let rate_limiter = AuthRateLimiter::default();
    let client = "127.0.0.2";

    // Default max is 5
    for _ in 0..4 {
        rate_limiter.record_failed_attempt(client);
    }
    assert!(rate_limiter.check_rate_limit(client));

    rate_limiter.record_failed_attempt(client);
    assert!(!rate_limiter.check_rate_limit(client));
}

#[test]
fn test_rate_limiter_resets_after_success() {
    let rate_limiter = AuthRateLimiter::default();
    let client = "127.0.0.3";

    for _ in 0..3 {
        rate_limiter.record_failed_attempt(client);
    }
    rate_limiter.record_success(client);

    // Failures before the success no longer count
    for _ in 0..4 {
        rate_limiter.record_failed_attempt(client);
    }
    assert!(rate_limiter.check_rate_limit(client));

    rate_limiter.record_failed_attempt(client);
    assert!(!rate_limiter.check_rate_limit(client));
}

#[test]
fn test_different_clients_tracked_separately() {
    let rate_limiter = AuthRateLimiter::default();

    for _ in 0..5 {
        rate_limiter.record_failed_attempt("192.168.0.1");
    }

    assert!(!rate_limiter.check_rate_limit("192.168.0.1"));
    assert!(rate_limiter.check_rate_limit("192.168.0.2"));
}

#[test]
fn test_lockout_expires() {
    let rate_limiter = AuthRateLimiter::new(2, Duration::from_millis(20));
    rate_limiter.record_failed_attempt("10.0.0.9");
    rate_limiter.record_failed_attempt("10.0.0.9");
    assert!(!rate_limiter.check_rate_limit("10.0.0.9"));

    std::thread::sleep(Duration::from_millis(40));
    assert!(rate_limiter.check_rate_limit("10.0.0.9"));
    rate_limiter.cleanup();
    assert!(rate_limiter.check_rate_limit("10.0.0.9"));
}
