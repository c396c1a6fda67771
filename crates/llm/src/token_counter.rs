//! Token counting for admission control.

use std::sync::OnceLock;

use tiktoken_rs::{CoreBPE, cl100k_base};

use crate::messages::ChatMessage;

/// Global tokenizer instance using cl100k_base encoding.
static TOKENIZER: OnceLock<CoreBPE> = OnceLock::new();

/// Get or initialize the tokenizer.
fn get_tokenizer() -> &'static CoreBPE {
    TOKENIZER.get_or_init(|| cl100k_base().expect("Failed to initialize cl100k_base tokenizer"))
}

/// Estimate the prompt tokens of a message list.
///
/// Uses the cl100k_base encoding. Not every platform tokenizes identically,
/// but the estimate is close enough for admission control, and the token
/// bucket is reconciled against the provider-reported count after the call.
///
/// Per message, the count covers role and content plus ~3 tokens of
/// structural overhead, and 3 more tokens are reserved for priming the
/// assistant reply, following OpenAI's counting guidelines.
pub fn count_input_tokens(messages: &[ChatMessage]) -> usize {
    let tokenizer = get_tokenizer();
    let mut total = 0;

    for message in messages {
        total += tokenizer.encode_ordinary(message.role.as_str()).len();
        total += tokenizer.encode_ordinary(&message.content).len();
    }

    // Structural markers around each message plus assistant reply priming.
    total += messages.len() * 3;
    total += 3;

    total
}
