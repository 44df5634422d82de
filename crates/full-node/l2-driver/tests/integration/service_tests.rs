use l2_driver::{Driver, DriverError, NodeService, TaskGroup};
use l2_rollup_interface::StepError;
use tokio_util::sync::CancellationToken;

use crate::helpers::*;

#[tokio::test(start_paused = true)]
async fn stop_shuts_down_running_driver() {
    initialize_logging();
    let cancel = CancellationToken::new();
    let mut service = NodeService::new(cancel.clone());
    service.start(Driver::derivation_only(
        driver_config(u32::MAX),
        ScriptedPipeline::new([]),
    ));
    tokio::time::sleep(ms(2_500)).await;

    service.stop().await.unwrap();
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn failing_driver_surfaces_through_service() {
    let mut service = NodeService::new(CancellationToken::new());
    service.start(Driver::derivation_only(
        driver_config(u32::MAX),
        ScriptedPipeline::new([Err(fatal())]),
    ));

    let err = service.wait().await.unwrap_err();

    let driver_error = err.downcast_ref::<DriverError>().unwrap();
    assert!(matches!(
        driver_error,
        DriverError::Derivation(StepError::Fatal(_))
    ));
}

#[tokio::test]
async fn failing_driver_cancels_sibling_tasks() {
    let cancel = CancellationToken::new();
    let mut tasks = TaskGroup::new(cancel.clone());
    let sibling = cancel.clone();
    tasks.spawn("sibling", async move {
        sibling.cancelled().await;
        Ok(())
    });
    Driver::derivation_only(driver_config(u32::MAX), ScriptedPipeline::new([Err(fatal())]))
        .start(&mut tasks);

    let err = tasks.wait().await.unwrap_err();

    assert!(err.is::<DriverError>());
    assert!(cancel.is_cancelled());
}

#[tokio::test]
async fn external_cancellation_is_reported() {
    let cancel = CancellationToken::new();
    let mut service = NodeService::new(cancel.clone());
    service.start(Driver::derivation_only(
        driver_config(u32::MAX),
        ScriptedPipeline::new([]),
    ));
    cancel.cancel();

    let err = service.wait().await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DriverError>(),
        Some(DriverError::Cancelled)
    ));
}
