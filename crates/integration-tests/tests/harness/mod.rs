#![allow(dead_code)]

pub mod mock_provider;

use modelgate_runtime::{InvokeResult, LlmResult};

/// Unwrap a non-streaming invocation result
pub fn complete(result: InvokeResult) -> LlmResult {
    match result {
        InvokeResult::Complete(result) => result,
        InvokeResult::Stream(_) => panic!("expected a complete result, got a stream"),
    }
}
