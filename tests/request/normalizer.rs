use std::{sync::Arc, time::Duration};

use serde_json::json;

use request_outcome::request::{
    error::{RejectionKind, TransportError},
    handlers::OutcomeHandlers,
    normalizer::OutcomeNormalizer,
    types::{Outcome, RequestConfig, RequestFlags, ResponseFormat},
};

use crate::support::{CallLog, ScriptedTransport, StalledTransport, normalizer_for};

fn tracked_handlers(log: &CallLog) -> OutcomeHandlers {
    let finally_log = log.clone();
    OutcomeHandlers::new().on_finally(move || finally_log.record("finally"))
}

#[tokio::test]
async fn given_success_answer_without_on_accepted_when_normalized_then_payload_is_accepted() {
    let payload = json!({"answer": "success", "items": [1, 2]});
    let transport = ScriptedTransport::replying(payload.clone());
    let log = CallLog::default();

    let outcome = normalizer_for(&transport)
        .normalize(
            RequestConfig::get("/items"),
            tracked_handlers(&log),
            RequestFlags::default(),
        )
        .await;

    assert_eq!(outcome, Outcome::Accepted(payload));
    assert_eq!(log.count("finally"), 1);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn given_any_request_when_normalized_then_json_format_is_forced() {
    let transport = ScriptedTransport::replying(json!({"answer": "success"}));
    let mut config = RequestConfig::get("/items");
    config.options.format = ResponseFormat::Text;

    normalizer_for(&transport)
        .normalize(config, OutcomeHandlers::new(), RequestFlags::default())
        .await;

    let sent = transport.last_options().expect("transport should be called");
    assert_eq!(sent.format, ResponseFormat::Json);
    assert_eq!(sent.endpoint, "/items");
}

#[tokio::test]
async fn given_on_accepted_returns_value_when_normalized_then_user_rejection_runs_in_order() {
    let transport = ScriptedTransport::replying(json!({"answer": "success", "age": 3}));
    let log = CallLog::default();
    let accepted_log = log.clone();
    let rejected_log = log.clone();
    let finally_log = log.clone();

    let handlers = OutcomeHandlers::new()
        .on_accepted(move |data| {
            accepted_log.record("accepted");
            (data["age"] == json!(3)).then(|| json!("too old"))
        })
        .on_rejected(move |kind, detail, raw| {
            rejected_log.record("rejected");
            assert_eq!(kind, RejectionKind::User);
            assert_eq!(detail, raw);
            json!({"shown": detail})
        })
        .on_finally(move || finally_log.record("finally"));

    let outcome = normalizer_for(&transport)
        .normalize(RequestConfig::get("/cache"), handlers, RequestFlags::default())
        .await;

    let Outcome::Rejected(rejection) = outcome else {
        panic!("soft rejection expected");
    };
    assert_eq!(rejection.kind, RejectionKind::User);
    assert_eq!(rejection.detail, json!({"shown": "too old"}));
    assert_eq!(rejection.raw, json!("too old"));
    assert_eq!(log.entries(), vec!["accepted", "rejected", "finally"]);
}

#[tokio::test]
async fn given_soft_rejection_without_on_rejected_when_normalized_then_raw_value_is_detail() {
    let transport = ScriptedTransport::replying(json!({"answer": "success"}));
    let log = CallLog::default();
    let handlers = tracked_handlers(&log).on_accepted(|_| Some(json!("not allowed")));

    let rejection = normalizer_for(&transport)
        .normalize(RequestConfig::get("/x"), handlers, RequestFlags::default())
        .await
        .into_result()
        .expect_err("soft rejection expected");

    assert_eq!(rejection.kind, RejectionKind::User);
    assert_eq!(rejection.detail, json!("not allowed"));
    assert_eq!(log.count("finally"), 1);
}

#[tokio::test]
async fn given_on_accepted_returns_nothing_when_normalized_then_acceptance_stands() {
    for verdict in [None, Some(json!(null))] {
        let payload = json!({"answer": "success", "id": 9});
        let transport = ScriptedTransport::replying(payload.clone());
        let handlers = OutcomeHandlers::new().on_accepted(move |_| verdict);

        let outcome = normalizer_for(&transport)
            .normalize(RequestConfig::get("/x"), handlers, RequestFlags::default())
            .await;
        assert_eq!(outcome, Outcome::Accepted(payload));
    }
}

#[tokio::test]
async fn given_on_accepted_returns_false_or_empty_string_when_normalized_then_user_rejection() {
    for verdict in [json!(false), json!("")] {
        let transport = ScriptedTransport::replying(json!({"answer": "success"}));
        let returned = verdict.clone();
        let handlers = OutcomeHandlers::new().on_accepted(move |_| Some(returned));

        let rejection = normalizer_for(&transport)
            .normalize(RequestConfig::get("/x"), handlers, RequestFlags::default())
            .await
            .into_result()
            .expect_err("falsy verdict is still a soft rejection");

        assert_eq!(rejection.kind, RejectionKind::User);
        assert_eq!(rejection.detail, verdict);
        assert_eq!(rejection.raw, verdict);
    }
}

#[tokio::test]
async fn given_error_answer_when_normalized_then_data_rejection_carries_declared_error() {
    let payload = json!({
        "answer": "error",
        "error": "name is required",
        "error_code": 4,
        "input_errors": {"name": ["This field may not be blank."]}
    });
    let transport = ScriptedTransport::replying(payload.clone());
    let log = CallLog::default();
    let accepted_log = log.clone();
    let handlers = tracked_handlers(&log).on_accepted(move |_| {
        accepted_log.record("accepted");
        None
    });

    let rejection = normalizer_for(&transport)
        .normalize(
            RequestConfig::post("/users", json!({"name": ""})),
            handlers,
            RequestFlags::default(),
        )
        .await
        .into_result()
        .expect_err("data rejection expected");

    assert_eq!(rejection.kind, RejectionKind::Data);
    assert_eq!(rejection.detail, json!("name is required"));
    assert_eq!(rejection.raw, payload);
    assert_eq!(rejection.error_code, Some(json!(4)));
    assert_eq!(
        rejection.input_errors,
        Some(json!({"name": ["This field may not be blank."]}))
    );
    assert_eq!(log.entries(), vec!["finally"]);
}

#[tokio::test]
async fn given_missing_answer_with_on_rejected_when_normalized_then_handler_sees_payload() {
    let payload = json!({"items": []});
    let transport = ScriptedTransport::replying(payload.clone());
    let expected_raw = payload.clone();
    let handlers = OutcomeHandlers::new().on_rejected(move |kind, detail, raw| {
        assert_eq!(kind, RejectionKind::Data);
        assert!(detail.is_null());
        assert_eq!(raw, &expected_raw);
        json!("server said no")
    });

    let rejection = normalizer_for(&transport)
        .normalize(RequestConfig::get("/items"), handlers, RequestFlags::default())
        .await
        .into_result()
        .expect_err("data rejection expected");

    assert_eq!(rejection.detail, json!("server said no"));
}

#[tokio::test]
async fn given_transport_failure_when_normalized_then_server_rejection_uses_status_text() {
    let transport = ScriptedTransport::failing(
        TransportError::new("Internal Server Error").with_status(500),
    );
    let log = CallLog::default();
    let rejected_log = log.clone();
    let handlers = tracked_handlers(&log).on_rejected(move |kind, detail, raw| {
        rejected_log.record("rejected");
        assert_eq!(kind, RejectionKind::Server);
        assert_eq!(raw["status"], json!(500));
        detail.clone()
    });

    let rejection = normalizer_for(&transport)
        .normalize(RequestConfig::get("/boom"), handlers, RequestFlags::default())
        .await
        .into_result()
        .expect_err("server rejection expected");

    assert_eq!(rejection.kind, RejectionKind::Server);
    assert_eq!(rejection.detail, json!("Internal Server Error"));
    assert_eq!(rejection.http_status, Some(500));
    assert_eq!(log.entries(), vec!["rejected", "finally"]);
}

#[tokio::test]
async fn given_no_answer_check_in_config_when_normalized_then_answer_is_ignored() {
    let payload = json!({"answer": "error", "error": "ignored"});
    let transport = ScriptedTransport::replying(payload.clone());

    let outcome = normalizer_for(&transport)
        .normalize(
            RequestConfig::get("/raw").with_no_answer_check(true),
            OutcomeHandlers::new(),
            RequestFlags::default(),
        )
        .await;

    assert_eq!(outcome, Outcome::Accepted(payload));
}

#[tokio::test]
async fn given_no_answer_check_flag_when_normalized_then_soft_rejection_still_applies() {
    let transport = ScriptedTransport::replying(json!([1, 2, 3]));
    let handlers = OutcomeHandlers::new().on_accepted(|data| {
        (data.as_array().map(Vec::len) != Some(0)).then(|| json!("list must be empty"))
    });

    let rejection = normalizer_for(&transport)
        .normalize(
            RequestConfig::get("/list"),
            handlers,
            RequestFlags::no_answer_check(),
        )
        .await
        .into_result()
        .expect_err("soft rejection expected");

    assert_eq!(rejection.kind, RejectionKind::User);
}

#[tokio::test]
async fn given_handlers_in_config_and_positional_when_normalized_then_config_handlers_win() {
    let transport = ScriptedTransport::failing(TransportError::new("error"));
    let log = CallLog::default();
    let embedded_log = log.clone();
    let positional_log = log.clone();
    let finally_log = log.clone();

    let config = RequestConfig::get("/x").with_handlers(OutcomeHandlers::new().on_rejected(
        move |_, _, _| {
            embedded_log.record("embedded");
            json!("embedded")
        },
    ));
    let positional = OutcomeHandlers::new()
        .on_rejected(move |_, _, _| {
            positional_log.record("positional");
            json!("positional")
        })
        .on_finally(move || finally_log.record("finally"));

    let rejection = normalizer_for(&transport)
        .normalize(config, positional, RequestFlags::default())
        .await
        .into_result()
        .expect_err("server rejection expected");

    assert_eq!(rejection.detail, json!("embedded"));
    assert_eq!(log.entries(), vec!["embedded", "finally"]);
}

#[tokio::test]
async fn given_same_config_twice_when_normalized_then_each_request_hits_transport() {
    let transport = ScriptedTransport::replying(json!({"answer": "success"}));
    let normalizer = normalizer_for(&transport);

    for _ in 0..2 {
        let outcome = normalizer
            .normalize(
                RequestConfig::get("/same"),
                OutcomeHandlers::new(),
                RequestFlags::default(),
            )
            .await;
        assert!(outcome.is_accepted());
    }
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn given_in_flight_request_when_future_is_dropped_then_finally_runs_once() {
    let transport = Arc::new(StalledTransport::default());
    let log = CallLog::default();
    let accepted_log = log.clone();
    let rejected_log = log.clone();
    let handlers = tracked_handlers(&log)
        .on_accepted(move |_| {
            accepted_log.record("accepted");
            None
        })
        .on_rejected(move |_, detail, _| {
            rejected_log.record("rejected");
            detail.clone()
        });

    let normalizer = OutcomeNormalizer::new(transport.clone());
    let elapsed = tokio::time::timeout(
        Duration::from_millis(50),
        normalizer.normalize(RequestConfig::get("/slow"), handlers, RequestFlags::default()),
    )
    .await;

    assert!(elapsed.is_err(), "stalled transport should never settle");
    assert_eq!(transport.calls(), 1);
    assert_eq!(log.entries(), vec!["finally"]);
}
