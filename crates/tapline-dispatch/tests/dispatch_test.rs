//! Integration tests for the per-packet dispatch pipeline.

mod helpers;

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use helpers::{
    OP_CHAT_MESSAGE, OP_CHECK_VERSION, OP_PING, engine, engine_with_transport, framed, packet,
    trace,
};
use tapline_core::types::direction::Direction;
use tapline_core::types::version::ProtocolVersion;
use tapline_dispatch::{HookAction, HookKey, HookSpec, OriginFilter, RawAction};

#[test]
fn orders_execute_ascending_with_ties_in_registration_order() {
    let dispatch = engine();
    let tr = trace();

    for (tag, order) in [("5a", 5), ("1", 1), ("5b", 5), ("0", 0)] {
        let t = tr.clone();
        dispatch.hook_raw(
            HookSpec::new("C_CHECK_VERSION").order(order),
            move |_, _, _, _| {
                t.borrow_mut().push(tag.to_string());
                Ok(RawAction::Continue)
            },
        );
    }

    let out = dispatch.handle(
        packet(OP_CHECK_VERSION, &json!({"version": 1})),
        Direction::ClientToServer,
        false,
    );
    assert!(out.is_some());
    assert_eq!(*tr.borrow(), vec!["0", "1", "5a", "5b"]);
}

#[test]
fn wildcard_bucket_runs_before_opcode_bucket() {
    let dispatch = engine();
    let tr = trace();

    let t = tr.clone();
    dispatch.hook_raw(HookSpec::new("C_CHECK_VERSION").order(-10), move |_, _, _, _| {
        t.borrow_mut().push("opcode".to_string());
        Ok(RawAction::Continue)
    });
    let t = tr.clone();
    dispatch.hook_raw(HookSpec::new("*").order(99), move |_, _, _, _| {
        t.borrow_mut().push("wildcard".to_string());
        Ok(RawAction::Continue)
    });

    dispatch.handle(
        packet(OP_CHECK_VERSION, &json!({})),
        Direction::ClientToServer,
        false,
    );
    assert_eq!(*tr.borrow(), vec!["wildcard", "opcode"]);
}

#[test]
fn drop_halts_remaining_hooks_across_buckets() {
    let dispatch = engine();
    let tr = trace();

    let t = tr.clone();
    dispatch.hook_raw(HookSpec::new("*").order(0), move |_, _, _, _| {
        t.borrow_mut().push("before".to_string());
        Ok(RawAction::Drop)
    });
    let t = tr.clone();
    dispatch.hook_raw(HookSpec::new("*").order(1), move |_, _, _, _| {
        t.borrow_mut().push("after-wildcard".to_string());
        Ok(RawAction::Continue)
    });
    let t = tr.clone();
    dispatch.hook_raw(HookSpec::new("C_CHECK_VERSION"), move |_, _, _, _| {
        t.borrow_mut().push("opcode".to_string());
        Ok(RawAction::Continue)
    });

    let out = dispatch.handle(
        packet(OP_CHECK_VERSION, &json!({})),
        Direction::ClientToServer,
        false,
    );
    assert!(out.is_none());
    assert_eq!(*tr.borrow(), vec!["before"]);
}

#[test]
fn decode_failure_forwards_buffer_unchanged_and_stops_the_pass() {
    let dispatch = engine();
    let tr = trace();

    let t = tr.clone();
    dispatch.hook_raw(HookSpec::new("*").order(-1), move |_, _, _, _| {
        t.borrow_mut().push("wild".to_string());
        Ok(RawAction::Continue)
    });
    let t = tr.clone();
    dispatch.hook(
        HookSpec::new("C_CHECK_VERSION").version(1u32),
        move |_, _| {
            t.borrow_mut().push("structured".to_string());
            Ok(HookAction::Continue)
        },
    );
    let t = tr.clone();
    dispatch.hook_raw(
        HookSpec::new("C_CHECK_VERSION").order(10),
        move |_, _, _, _| {
            t.borrow_mut().push("later".to_string());
            Ok(RawAction::Continue)
        },
    );

    // Header only: the schema requires a body, so decode fails.
    let header_only = framed(OP_CHECK_VERSION, b"");
    let out = dispatch.handle(header_only.clone(), Direction::ClientToServer, false);

    assert_eq!(out.as_deref(), Some(header_only.as_ref()));
    assert_eq!(*tr.borrow(), vec!["wild"]);
}

#[test]
fn panicking_hook_does_not_block_siblings_now_or_later() {
    let dispatch = engine();
    let tr = trace();

    dispatch.hook_raw(
        HookSpec::new("C_CHECK_VERSION").order(0),
        |_, _, _, _| panic!("misbehaving module"),
    );
    let t = tr.clone();
    dispatch.hook_raw(
        HookSpec::new("C_CHECK_VERSION").order(1),
        move |_, _, _, _| {
            t.borrow_mut().push("sibling".to_string());
            Ok(RawAction::Continue)
        },
    );

    for _ in 0..2 {
        let out = dispatch.handle(
            packet(OP_CHECK_VERSION, &json!({})),
            Direction::ClientToServer,
            false,
        );
        assert!(out.is_some());
    }
    assert_eq!(*tr.borrow(), vec!["sibling", "sibling"]);
}

#[test]
fn erroring_hook_is_treated_as_a_noop() {
    let dispatch = engine();
    let tr = trace();

    dispatch.hook(HookSpec::new("C_CHAT_MESSAGE").version(1u32), |_, _| {
        Err(tapline_core::DispatchError::module("module bug"))
    });
    let t = tr.clone();
    dispatch.hook(
        HookSpec::new("C_CHAT_MESSAGE").version(1u32).order(1),
        move |event, _| {
            t.borrow_mut().push(event.data["text"].to_string());
            Ok(HookAction::Continue)
        },
    );

    let out = dispatch.handle(
        packet(OP_CHAT_MESSAGE, &json!({"text": "hi"})),
        Direction::ClientToServer,
        false,
    );
    assert!(out.is_some());
    assert_eq!(*tr.borrow(), vec!["\"hi\""]);
}

#[test]
fn raw_replacement_is_visible_to_later_hooks() {
    let dispatch = engine();
    let seen = trace();

    dispatch.hook_raw(
        HookSpec::new("C_CHAT_MESSAGE").order(0),
        |_, _, _, _| Ok(RawAction::Replace(packet(OP_CHAT_MESSAGE, &json!({"text": "redacted"})))),
    );
    let s = seen.clone();
    dispatch.hook(
        HookSpec::new("C_CHAT_MESSAGE").version(1u32).order(1),
        move |event, _| {
            s.borrow_mut().push(event.data["text"].as_str().unwrap().to_string());
            Ok(HookAction::Continue)
        },
    );

    let out = dispatch
        .handle(
            packet(OP_CHAT_MESSAGE, &json!({"text": "secret"})),
            Direction::ClientToServer,
            false,
        )
        .expect("forwarded");
    assert_eq!(*seen.borrow(), vec!["redacted"]);
    assert_eq!(helpers::body_of(&out)["text"], "redacted");
}

#[test]
fn modified_event_is_reencoded_for_later_hooks() {
    let dispatch = engine();

    dispatch.hook(
        HookSpec::new("C_CHAT_MESSAGE").version(1u32).order(0),
        |event, _| {
            event.data["text"] = json!("rewritten");
            Ok(HookAction::Modified)
        },
    );
    let seen = trace();
    let s = seen.clone();
    dispatch.hook(
        HookSpec::new("C_CHAT_MESSAGE").version(1u32).order(1),
        move |event, _| {
            s.borrow_mut().push(event.data["text"].as_str().unwrap().to_string());
            Ok(HookAction::Continue)
        },
    );

    let out = dispatch
        .handle(
            packet(OP_CHAT_MESSAGE, &json!({"text": "original"})),
            Direction::ClientToServer,
            false,
        )
        .expect("forwarded");
    assert_eq!(*seen.borrow(), vec!["rewritten"]);
    assert_eq!(helpers::body_of(&out)["text"], "rewritten");
}

#[test]
fn encode_failure_discards_the_mutation_and_continues() {
    let dispatch = engine();

    dispatch.hook(
        HookSpec::new("C_CHAT_MESSAGE").version(1u32).order(0),
        |event, _| {
            event.data["__unencodable"] = json!(true);
            Ok(HookAction::Modified)
        },
    );
    let seen = trace();
    let s = seen.clone();
    dispatch.hook(
        HookSpec::new("C_CHAT_MESSAGE").version(1u32).order(1),
        move |event, _| {
            s.borrow_mut().push(event.data["text"].as_str().unwrap().to_string());
            Ok(HookAction::Continue)
        },
    );

    let out = dispatch
        .handle(
            packet(OP_CHAT_MESSAGE, &json!({"text": "kept"})),
            Direction::ClientToServer,
            false,
        )
        .expect("forwarded");
    // The failed mutation never reached the wire buffer.
    assert_eq!(*seen.borrow(), vec!["kept"]);
    assert_eq!(helpers::body_of(&out)["text"], "kept");
}

#[test]
fn origin_filters_select_real_fake_or_all_traffic() {
    let dispatch = engine();
    let tr = trace();

    for (tag, filter) in [
        ("real", OriginFilter::Real),
        ("fake", OriginFilter::Fake),
        ("all", OriginFilter::All),
    ] {
        let t = tr.clone();
        dispatch.hook_raw(
            HookSpec::new("C_CHECK_VERSION").filter(filter),
            move |_, _, _, fake| {
                t.borrow_mut().push(format!("{tag}:{fake}"));
                Ok(RawAction::Continue)
            },
        );
    }

    dispatch.handle(packet(OP_CHECK_VERSION, &json!({})), Direction::ClientToServer, false);
    dispatch.handle(packet(OP_CHECK_VERSION, &json!({})), Direction::ClientToServer, true);

    assert_eq!(
        *tr.borrow(),
        vec!["real:false", "all:false", "fake:true", "all:true"]
    );
}

#[test]
fn short_buffer_is_forwarded_untouched() {
    let dispatch = engine();
    let tr = trace();
    let t = tr.clone();
    dispatch.hook_raw(HookSpec::new("*"), move |_, _, _, _| {
        t.borrow_mut().push("ran".to_string());
        Ok(RawAction::Continue)
    });

    let stub = bytes::Bytes::from_static(&[0x02, 0x00]);
    let out = dispatch.handle(stub.clone(), Direction::ServerToClient, false);
    assert_eq!(out.as_deref(), Some(stub.as_ref()));
    assert!(tr.borrow().is_empty());
}

#[test]
fn unresolvable_name_registers_but_never_fires() {
    let dispatch = engine();
    let tr = trace();

    let t = tr.clone();
    let handle = dispatch.hook(HookSpec::new("X_NO_SUCH_MESSAGE").version(1u32), move |_, _| {
        t.borrow_mut().push("fired".to_string());
        Ok(HookAction::Continue)
    });
    assert_eq!(handle.key(), HookKey::Unknown);

    for opcode in [OP_CHECK_VERSION, OP_CHAT_MESSAGE, OP_PING] {
        dispatch.handle(packet(opcode, &json!({})), Direction::ClientToServer, false);
        dispatch.handle(packet(opcode, &json!({})), Direction::ServerToClient, true);
    }
    assert!(tr.borrow().is_empty());
}

#[test]
fn hooks_registered_mid_pass_wait_for_the_next_pass() {
    let dispatch = engine();
    let tr = trace();

    let registered = Rc::new(Cell::new(false));
    let engine_ref = dispatch.clone();
    let t = tr.clone();
    let once = registered.clone();
    dispatch.hook_raw(HookSpec::new("*"), move |_, _, _, _| {
        if !once.get() {
            once.set(true);
            let inner = t.clone();
            engine_ref.hook_raw(HookSpec::new("S_PING").order(50), move |_, _, _, _| {
                inner.borrow_mut().push("late".to_string());
                Ok(RawAction::Continue)
            });
        }
        Ok(RawAction::Continue)
    });

    dispatch.handle(packet(OP_PING, &json!({})), Direction::ServerToClient, false);
    assert!(tr.borrow().is_empty(), "new hook must not run in the pass that registered it");

    dispatch.handle(packet(OP_PING, &json!({})), Direction::ServerToClient, false);
    assert_eq!(*tr.borrow(), vec!["late"]);
}

#[test]
fn hooks_removed_mid_pass_are_skipped() {
    let dispatch = engine();
    let tr = trace();

    let victim = Rc::new(RefCell::new(None));

    let engine_ref = dispatch.clone();
    let slot = victim.clone();
    dispatch.hook_raw(HookSpec::new("S_PING").order(0), move |_, _, _, _| {
        if let Some(handle) = slot.borrow().as_ref() {
            engine_ref.unhook(handle);
        }
        Ok(RawAction::Continue)
    });

    let t = tr.clone();
    let handle = dispatch.hook_raw(HookSpec::new("S_PING").order(5), move |_, _, _, _| {
        t.borrow_mut().push("victim".to_string());
        Ok(RawAction::Continue)
    });
    *victim.borrow_mut() = Some(handle);

    dispatch.handle(packet(OP_PING, &json!({})), Direction::ServerToClient, false);
    assert!(tr.borrow().is_empty());
}

#[test]
fn a_hook_can_inject_while_its_packet_is_in_flight() {
    let (dispatch, transport) = engine_with_transport();
    let tr = trace();

    let t = tr.clone();
    dispatch.hook(
        HookSpec::new("S_PING").version(1u32).filter(OriginFilter::Fake),
        move |event, fake| {
            assert!(fake);
            t.borrow_mut().push(format!("ping:{}", event.data["seq"]));
            Ok(HookAction::Continue)
        },
    );

    let engine_ref = dispatch.clone();
    dispatch.hook(
        HookSpec::new("C_CHAT_MESSAGE").version(1u32),
        move |_, _| {
            let sent = engine_ref.write(
                Direction::ServerToClient,
                "S_PING",
                Some(ProtocolVersion::Exact(1)),
                json!({"seq": 7}),
            );
            assert!(sent);
            Ok(HookAction::Continue)
        },
    );

    let out = dispatch.handle(
        packet(OP_CHAT_MESSAGE, &json!({"text": "hello"})),
        Direction::ClientToServer,
        false,
    );
    assert!(out.is_some());
    assert_eq!(*tr.borrow(), vec!["ping:7"]);
    assert_eq!(transport.sent_count(), 1);
    assert_eq!(transport.sent.borrow()[0].0, Direction::ServerToClient);
}
