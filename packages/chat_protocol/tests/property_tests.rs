use proptest::prelude::*;

use chat_protocol::{Event, EventKind, Identity, channel_url, peek_receiver};

fn arb_identity() -> impl Strategy<Value = Identity> {
    "[A-Za-z0-9_.@-]{1,24}".prop_map(|s| Identity::new(s).unwrap())
}

proptest! {
    #[test]
    fn channel_url_path_yields_identity(id in arb_identity(), port in 1u16..) {
        let url = channel_url(&format!("ws://127.0.0.1:{port}/ws/chat"), &id);
        let path = url.splitn(4, '/').nth(3).unwrap();
        prop_assert_eq!(Identity::from_path(path), Some(id));
    }

    #[test]
    fn peek_receiver_agrees_with_decode(
        sender in arb_identity(),
        receiver in arb_identity(),
        text in ".*",
    ) {
        let raw = Event::message(sender, receiver.clone(), text).encode().unwrap();
        let decoded = Event::decode(&raw).unwrap();
        prop_assert_eq!(peek_receiver(&raw).unwrap(), decoded.receiver_id);
        prop_assert_eq!(peek_receiver(&raw).unwrap(), Some(receiver));
    }

    #[test]
    fn message_text_wins_over_typing_flag(
        sender in arb_identity(),
        receiver in arb_identity(),
        text in ".*",
        typing in proptest::option::of(any::<bool>()),
    ) {
        let mut event = Event::message(sender, receiver, text.clone());
        event.typing = typing;
        prop_assert_eq!(event.kind(), EventKind::Message(&text));
    }

    #[test]
    fn arbitrary_text_never_panics(raw in ".*") {
        let _ = Event::decode(&raw);
        let _ = peek_receiver(&raw);
    }
}
