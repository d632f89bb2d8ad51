use rask_log_beacon::app;
use rask_log_beacon::BeaconError;

#[tokio::main]
async fn main() -> Result<(), BeaconError> {
    app::main().await
}
