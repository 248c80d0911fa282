//! Result slots for batched calls.

use std::{
    fmt,
    marker::PhantomData,
    mem,
    sync::{Arc, Mutex, PoisonError},
};

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ClientError;
use crate::message::Request;

#[derive(Debug, Default)]
enum SlotState {
    #[default]
    Pending,
    Done(Result<Value, ClientError>),
    Taken,
}

type SharedSlot = Arc<Mutex<SlotState>>;

/// Handle to the result of one call queued with
/// [`RpcClient::batch_append`](super::RpcClient::batch_append).
///
/// The slot is filled when [`RpcClient::batch_call`](super::RpcClient::batch_call)
/// completes, whether the batch succeeded or failed.
pub struct BatchSlot<R> {
    state: SharedSlot,
    _result: PhantomData<fn() -> R>,
}

impl<R> fmt::Debug for BatchSlot<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchSlot")
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl<R> BatchSlot<R> {
    /// Whether a result is waiting to be taken.
    #[must_use]
    pub fn is_ready(&self) -> bool { matches!(*lock(&self.state), SlotState::Done(_)) }
}

impl<R: DeserializeOwned> BatchSlot<R> {
    /// Move the result out of the slot.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotCompleted`] before the batch ran or after
    /// the result was already taken, [`ClientError::Decode`] if the result
    /// does not fit `R`, and otherwise the error recorded for this call.
    pub fn take(&self) -> Result<R, ClientError> {
        let state = {
            let mut guard = lock(&self.state);
            if !matches!(*guard, SlotState::Done(_)) {
                return Err(ClientError::NotCompleted);
            }
            mem::replace(&mut *guard, SlotState::Taken)
        };
        match state {
            SlotState::Done(result) => {
                serde_json::from_value(result?).map_err(|err| ClientError::decode(&err))
            }
            SlotState::Pending | SlotState::Taken => Err(ClientError::NotCompleted),
        }
    }
}

/// A queued request and the slot its result lands in.
#[derive(Debug)]
pub(super) struct PendingCall {
    pub request: Request,
    state: SharedSlot,
}

impl PendingCall {
    pub(super) fn new<R>(request: Request) -> (Self, BatchSlot<R>) {
        let state = SharedSlot::default();
        let slot = BatchSlot {
            state: Arc::clone(&state),
            _result: PhantomData,
        };
        (Self { request, state }, slot)
    }

    pub(super) fn complete(&self, result: Result<Value, ClientError>) {
        *lock(&self.state) = SlotState::Done(result);
    }
}

// A panic while holding the lock cannot leave the state half-written.
fn lock(state: &Mutex<SlotState>) -> std::sync::MutexGuard<'_, SlotState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
