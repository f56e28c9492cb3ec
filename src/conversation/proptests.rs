//! Property-based tests for the conversation store
//!
//! Random append sequences are checked against a simple pending-count model.

use super::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Append { sender: Sender, text: String },
    Discard,
}

fn arb_sender() -> impl Strategy<Value = Sender> {
    prop_oneof![Just(Sender::User), Just(Sender::Bot)]
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-zA-Z ]{1,30}",
        1 => "[ \t\n]{0,4}",
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        9 => (arb_sender(), arb_text()).prop_map(|(sender, text)| Op::Append { sender, text }),
        1 => Just(Op::Discard),
    ]
}

proptest! {
    #[test]
    fn prop_store_matches_pending_model(ops in proptest::collection::vec(arb_op(), 0..60)) {
        let mut store = ConversationStore::new();
        let mut model_pending = 0usize;
        let mut model_len = 1usize;
        let mut last_sender = Sender::Bot;

        for op in ops {
            match op {
                Op::Append { sender, text } => {
                    let expect_ok = !text.trim().is_empty()
                        && match sender {
                            Sender::User => !(last_sender == Sender::User && model_pending == 0),
                            Sender::Bot => model_pending > 0,
                        };

                    let result = store.append(sender, text.clone());
                    prop_assert_eq!(result.is_ok(), expect_ok);

                    if let Ok(message) = result {
                        prop_assert_eq!(message.text, text);
                        prop_assert_eq!(message.sender, sender);
                        match sender {
                            Sender::User => model_pending += 1,
                            Sender::Bot => model_pending -= 1,
                        }
                        model_len += 1;
                        last_sender = sender;
                    }
                }
                Op::Discard => {
                    prop_assert_eq!(store.discard_pending(), model_pending);
                    model_pending = 0;
                }
            }

            let snapshot = store.snapshot();
            prop_assert_eq!(snapshot.history.len(), model_len);
            prop_assert_eq!(snapshot.pending, model_pending);
            prop_assert_eq!(snapshot.busy, model_pending > 0);
        }
    }

    #[test]
    fn prop_history_is_ordered(count in 1usize..30) {
        let mut store = ConversationStore::new();
        for i in 0..count {
            store.append(Sender::User, format!("question {i}")).unwrap();
        }
        for i in 0..count {
            store.append(Sender::Bot, format!("answer {i}")).unwrap();
        }

        let history = store.snapshot().history;
        prop_assert_eq!(history[0].text.as_str(), GREETING);
        for pair in history.windows(2) {
            prop_assert!(pair[0].id < pair[1].id);
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }
}
