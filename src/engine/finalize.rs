//! Completion finalizer: commits the answer and the follow-up turn.

use chrono::Utc;

use crate::context::ExecutionScope;
use crate::types::{MessageMutation, ResultAttachment, Role, TranscriptMessage};

/// Write the final answer into the placeholder.
///
/// The body is only replaced when it differs. The date is stamped and the
/// status cleared either way.
pub fn commit_answer(scope: &mut ExecutionScope, answer: &str) {
    if scope.placeholder().body != answer {
        scope.update(MessageMutation::SetBody(answer.to_string()));
    }
    scope.update(MessageMutation::Stamp(Utc::now()));
    scope.clear_status();
}

/// Commit the answer, then append the automated follow-up turn that carries
/// the function results. The follow-up is skipped when the query was
/// cancelled or produced no results.
pub fn complete(
    scope: &mut ExecutionScope,
    answer: &str,
    results: Vec<ResultAttachment>,
    cancelled: bool,
) -> Option<TranscriptMessage> {
    commit_answer(scope, answer);

    if cancelled || results.is_empty() {
        return None;
    }

    let mut follow_up = TranscriptMessage::new(Role::User, "");
    follow_up.is_automated = true;
    follow_up.attachments = results;
    scope.append_message(follow_up.clone());
    Some(follow_up)
}
