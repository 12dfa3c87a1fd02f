// Per-host sampler against a scripted executor

mod common;

use common::{MockExecutor, Reply, host};
use std::time::Duration;
use vserver_stats::error::SampleError;
use vserver_stats::remote::ExecOutput;
use vserver_stats::sampler::Sampler;

const TIMEOUT: Duration = Duration::from_secs(15);

#[tokio::test(start_paused = true)]
async fn test_sample_end_to_end_rates() {
    let exec = MockExecutor::new();
    exec.push("web", Reply::json("Last login: today\n{\"rx\":1000,\"tx\":0}\n"))
        .push("web", Reply::json("{\"rx\":2000,\"tx\":0}").after(Duration::from_secs(1)));
    let mut sampler = Sampler::new();
    let web = host("web");

    let first = sampler.sample(&exec, &web, "true", TIMEOUT).await.unwrap();
    let second = sampler.sample(&exec, &web, "true", TIMEOUT).await.unwrap();
    assert_eq!(first.net_in, Some(0.0));
    assert_eq!(second.net_in, Some(1000.0));
}

#[tokio::test(start_paused = true)]
async fn test_sample_timeout_is_connection_failure() {
    let exec = MockExecutor::new();
    exec.push("web", Reply::json("{}").after(Duration::from_secs(30)));
    let mut sampler = Sampler::new();

    let err = sampler
        .sample(&exec, &host("web"), "true", Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, SampleError::ConnectionFailed(ref m) if m.contains("timed out")));
}

#[tokio::test]
async fn test_sample_command_failure() {
    let exec = MockExecutor::new();
    exec.push(
        "web",
        Reply {
            delay: Duration::ZERO,
            result: Ok(ExecOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: Some(1),
            }),
        },
    );
    let mut sampler = Sampler::new();
    let err = sampler
        .sample(&exec, &host("web"), "true", TIMEOUT)
        .await
        .unwrap_err();
    assert_eq!(err, SampleError::CommandFailed("exit status 1".into()));
}

#[tokio::test]
async fn test_sample_malformed_keeps_excerpt() {
    let exec = MockExecutor::new();
    exec.push("web", Reply::json("Permission denied, please try again."));
    let mut sampler = Sampler::new();
    match sampler.sample(&exec, &host("web"), "true", TIMEOUT).await {
        Err(SampleError::MalformedResponse { excerpt, .. }) => {
            assert!(excerpt.contains("Permission denied"))
        }
        other => panic!("expected malformed response, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_sample_leaves_rate_baseline() {
    let exec = MockExecutor::new();
    exec.push("web", Reply::json("{\"rx\":100,\"tx\":100}"))
        .push("web", Reply::err(SampleError::ConnectionFailed("reset".into())));
    let mut sampler = Sampler::new();
    let web = host("web");

    sampler.sample(&exec, &web, "true", TIMEOUT).await.unwrap();
    assert!(sampler.sample(&exec, &web, "true", TIMEOUT).await.is_err());
    let snap = sampler
        .normalize("web", "{\"rx\":1100,\"tx\":100}", 1_000.0)
        .unwrap();
    assert_eq!(snap.net_in, Some(1.0));
    assert_eq!(snap.net_out, Some(0.0));
}
