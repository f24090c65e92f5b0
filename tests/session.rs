use cliprobe_core::cli::{CliResult, ExitCodes, FailureKind};
use cliprobe_core::core::retry::{ControllerState, RetryPolicy};
use cliprobe_core::core::session::Session;
use cliprobe_core::core::transport::{
    ScriptedCall, ScriptedTransport, TransportError, TransportType,
};
use tokio_util::sync::CancellationToken;

fn session(transport: ScriptedTransport) -> Session {
    Session::with_transport(
        Box::new(transport),
        RetryPolicy::default().without_delays(),
        CancellationToken::new(),
    )
}

#[tokio::test]
async fn verify_opens_runs_and_closes() {
    let transport = ScriptedTransport::new("client").then_capture("ifconfig up\r\nDone\r\n");
    let log = transport.log();
    let mut session = session(transport);
    assert_eq!(session.transport_type(), TransportType::Scripted);
    assert_eq!(session.endpoint(), "client");

    let verdict = session.verify("ifconfig up", "Done", None).await.unwrap();

    assert!(verdict.passed());
    assert_eq!(CliResult::from_verdict(&verdict).code(), ExitCodes::SUCCESS);
    assert_eq!(
        *log.lock(),
        vec![
            ScriptedCall::Open,
            ScriptedCall::Send("ifconfig up".to_string()),
            ScriptedCall::Capture,
            ScriptedCall::Close,
        ]
    );
}

#[tokio::test]
async fn unreachable_endpoint_touches_nothing() {
    let missing = TransportError::SessionNotFound("client".into());
    let transport = ScriptedTransport::new("client").fail_open(missing);
    let log = transport.log();
    let mut session = session(transport);

    let err = session.verify("state", "leader", None).await.unwrap_err();

    assert!(err.is_connection_error());
    assert_eq!(CliResult::connection_failed(err.to_string()).code(), ExitCodes::FAILURE);
    assert_eq!(*log.lock(), vec![ScriptedCall::Open, ScriptedCall::Close]);
}

#[tokio::test]
async fn failing_writes_exit_nonzero_and_close() {
    let transport = ScriptedTransport::new("/dev/ttyCliServer").fail_writes();
    let log = transport.log();
    let mut session = session(transport);

    let verdict = session.verify("reset", "Done", None).await.unwrap();

    assert_eq!(verdict.state, ControllerState::Failed);
    let result = CliResult::from_verdict(&verdict);
    assert_eq!(result.code(), ExitCodes::FAILURE);
    assert!(matches!(result, CliResult::Failure(FailureKind::VerificationFailed, _)));
    assert_eq!(log.lock().last(), Some(&ScriptedCall::Close));
}

#[tokio::test]
async fn cancelled_session_still_closes() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let transport = ScriptedTransport::new("client");
    let log = transport.log();
    let mut session = Session::with_transport(Box::new(transport), RetryPolicy::default(), cancel);

    let verdict = session.verify("state", "leader", None).await.unwrap();

    assert_eq!(verdict.state, ControllerState::ShutdownRequested);
    assert!(matches!(
        CliResult::from_verdict(&verdict),
        CliResult::Failure(FailureKind::Cancelled, _)
    ));
    assert_eq!(*log.lock(), vec![ScriptedCall::Open, ScriptedCall::Close]);
}

#[tokio::test]
async fn window_observer_is_forwarded() {
    let transport = ScriptedTransport::new("client").then_capture("state\r\nleader\r\n");
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut session = session(transport);

    let verdict = session
        .verify(
            "state",
            "leader",
            Some(Box::new(move |window: &str| {
                let _ = tx.send(window.to_string());
            })),
        )
        .await
        .unwrap();

    assert!(verdict.passed());
    assert_eq!(rx.recv().await.as_deref(), Some("state\r\nleader\r\n"));
}

#[tokio::test]
async fn probe_output_finds_token_without_sending() {
    let transport = ScriptedTransport::new("client").then_capture("> state\r\nchild\r\nDone\r\n");
    let log = transport.log();
    let mut session = session(transport);

    let probe = session.probe_output("child").await.unwrap();

    assert!(probe.passed);
    assert_eq!(probe.captured, "> state\r\nchild\r\nDone\r\n");
    assert_eq!(
        *log.lock(),
        vec![ScriptedCall::Open, ScriptedCall::Capture, ScriptedCall::Close]
    );
}

#[tokio::test]
async fn probe_output_missing_token() {
    let transport = ScriptedTransport::new("client").then_capture("> \r\n");
    let mut session = session(transport);

    let probe = session.probe_output("router").await.unwrap();

    assert!(!probe.passed);
}

#[tokio::test]
async fn probe_output_read_error_closes() {
    let transport = ScriptedTransport::new("client").then_capture_error("pane vanished");
    let log = transport.log();
    let mut session = session(transport);

    let err = session.probe_output("router").await.unwrap_err();

    assert!(matches!(err, TransportError::Read(_)));
    assert_eq!(log.lock().last(), Some(&ScriptedCall::Close));
}
