//! Chat-list subscriptions.
//!
//! [`subscribe`] turns a store's change channel into a lazy stream of chat-list
//! snapshots: the current list first, then a fresh list after every change
//! that can affect it. Each snapshot replaces the previous one wholesale.
//! Dropping the stream unsubscribes.

use std::sync::Arc;

use bubble_types::{Chat, ChatFilter};
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use super::{ChatChange, ChatStore};
use crate::error::Result;

pub type ChatSubscription = BoxStream<'static, Result<Vec<Chat>>>;

struct FeedState<S> {
    store: Arc<S>,
    rx: broadcast::Receiver<ChatChange>,
    filter: ChatFilter,
    primed: bool,
}

/// Subscribe to snapshots of the chats matching `filter`.
///
/// The change receiver is taken before the first snapshot is read, so no
/// write that lands after this call is missed.
pub fn subscribe<S: ChatStore>(store: Arc<S>, filter: ChatFilter) -> ChatSubscription {
    let state = FeedState {
        rx: store.changes(),
        store,
        filter,
        primed: false,
    };

    stream::unfold(state, |mut st| async move {
        if st.primed {
            loop {
                match st.rx.recv().await {
                    Ok(change) if change.affects_chat_list() => break,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "chat feed lagged; resending snapshot");
                        break;
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        }
        st.primed = true;
        let snapshot = st.store.list_chats(&st.filter).await;
        Some((snapshot, st))
    })
    .boxed()
}
