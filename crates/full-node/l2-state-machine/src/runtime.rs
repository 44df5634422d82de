use tokio_util::sync::CancellationToken;

/// A machine that advances by interpreting one state at a time.
///
/// Returning `Ok(None)` ends the run cleanly. Returning an error ends it with
/// that error; a transition can never yield both a next state and an error.
#[async_trait::async_trait]
pub trait StateMachine: Send {
    /// The closed set of states the machine moves through.
    type State: Send;
    /// Error that terminates the machine.
    type Error: Send;

    /// Interprets `state` and returns the state to interpret next.
    async fn transition(
        &mut self,
        state: Self::State,
        cancel: &CancellationToken,
    ) -> Result<Option<Self::State>, Self::Error>;
}

/// Runs `machine` from `initial` until a transition returns no next state or fails.
pub async fn run<M>(
    machine: &mut M,
    initial: M::State,
    cancel: &CancellationToken,
) -> Result<(), M::Error>
where
    M: StateMachine + ?Sized,
{
    let mut next = Some(initial);
    while let Some(state) = next.take() {
        next = machine.transition(state, cancel).await?;
    }
    Ok(())
}
