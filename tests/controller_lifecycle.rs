//! Connection lifecycle and read behavior through the public API

use std::sync::Arc;

use anyhow::Result;
use fusion_reader::vendors::scripted::{ScriptStep, ScriptedLibrary};
use fusion_reader::{
    ConnectionState, ControllerConfig, ControllerOptions, ErrorKind, FieldValue, FusionController,
    FusionError, SaleRecord,
};

fn controller(library: &ScriptedLibrary) -> FusionController {
    FusionController::with_library(
        "192.168.1.100",
        Arc::new(library.clone()),
        ControllerOptions::default(),
    )
}

#[tokio::test]
async fn reads_require_connection() -> Result<()> {
    let library = ScriptedLibrary::new()
        .with_last_sales([ScriptStep::Sale(SaleRecord::new().with("TransactionId", 1))])
        .with_grade(1, "Super");
    let controller = controller(&library);

    for err in [
        controller.get_last_sale().await.unwrap_err(),
        controller.get_last_sale_on_fusion().await.unwrap_err(),
        controller.get_sale(1, 0).await.unwrap_err(),
        controller.get_grade(1).await.unwrap_err(),
        controller.period_sales_by_grade().await.unwrap_err(),
    ] {
        assert_eq!(err.kind(), ErrorKind::Connection, "{}", err);
    }

    let stats = library.stats();
    assert_eq!(stats.sessions_opened, 0);
    assert_eq!(stats.queries, 0);
    Ok(())
}

#[tokio::test]
async fn reads_after_disconnect_fail() -> Result<()> {
    let library = ScriptedLibrary::new();
    let controller = controller(&library);
    assert!(controller.connect().await?);
    controller.disconnect().await;

    let err = controller.get_last_sale().await.unwrap_err();
    assert!(matches!(err, FusionError::NotConnected { state: ConnectionState::Closed }));
    assert_eq!(library.stats().queries, 0);
    Ok(())
}

#[tokio::test]
async fn disconnect_twice_or_before_connect() -> Result<()> {
    let library = ScriptedLibrary::new();

    let never_connected = controller(&library);
    never_connected.disconnect().await;
    never_connected.disconnect().await;
    assert_eq!(never_connected.state(), ConnectionState::Unopened);

    let connected = controller(&library);
    assert!(connected.connect().await?);
    connected.disconnect().await;
    connected.disconnect().await;
    assert_eq!(connected.state(), ConnectionState::Closed);
    assert!(!connected.is_connected());

    assert_eq!(library.stats().disconnects, 1);
    Ok(())
}

#[tokio::test]
async fn fields_are_returned_verbatim() -> Result<()> {
    let sale = SaleRecord::new()
        .with("TransactionId", "000412")
        .with("PumpNumber", 3)
        .with("Volume", 25.4)
        .with("Attendant", "")
        .with("Prepaid", false)
        .with("Vendor Specific Field", "x|y=z");
    let library = ScriptedLibrary::new().with_last_sales([ScriptStep::Sale(sale.clone())]);
    let controller = controller(&library);
    controller.connect().await?;

    let read = controller.get_last_sale().await?.expect("scripted sale");
    assert_eq!(read, sale);
    assert_eq!(read.get("TransactionId"), Some(&FieldValue::Text("000412".into())));
    assert_eq!(read.get("Attendant"), Some(&FieldValue::Text(String::new())));
    assert_eq!(read.get("Vendor Specific Field").and_then(FieldValue::as_str), Some("x|y=z"));
    Ok(())
}

#[tokio::test]
async fn declined_connection_can_be_retried() -> Result<()> {
    let declining = ScriptedLibrary::new().declining_connections();
    let controller = controller(&declining);

    assert!(!controller.connect().await?);
    assert!(!controller.connect().await?);
    assert_eq!(controller.state(), ConnectionState::Unopened);

    let stats = declining.stats();
    assert_eq!(stats.sessions_opened, 2);
    assert_eq!(stats.sessions_released, 2);
    Ok(())
}

#[test]
fn missing_vendor_module_is_a_load_failure() {
    let config = ControllerConfig::new("192.168.1.100", "/nonexistent/FusionClass.dll");
    let err = FusionController::new(&config).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Load);
    assert!(!err.is_retryable());
    assert!(!err.recovery_suggestions().is_empty());
}

#[test]
fn invalid_config_is_rejected_before_loading() {
    let config = ControllerConfig::new("", "/nonexistent/FusionClass.dll");
    let err = FusionController::new(&config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}
