use ha_weatherbridge::homeassistant::connection::MqttConnection;
use ha_weatherbridge::homeassistant::{HAPublisher, Topics};
use ha_weatherbridge::http::{router, shutdown_signal, AppState};
use ha_weatherbridge::settings::Settings;
use ha_weatherbridge::wunderground::WundergroundRelay;
use ha_weatherbridge::WeatherBridge;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};

const MQTT_CONNECT_WAIT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() {
    let settings = match Settings::new() {
        Ok(settings) => settings,
        Err(e) => {
            tracing_subscriber::fmt().with_max_level(Level::INFO).init();
            error!(error = %e, "Failed to read settings");
            process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(settings.log_level())
        .init();

    let identity = settings.device.identity();
    let units = settings.unit_system();
    let timezone = settings.timezone();
    let topics = Topics::new(&settings.mqtt.prefix, &identity.id);

    info!(
        device = %identity.id,
        units = %units,
        timezone = %timezone,
        mqtt_host = %settings.mqtt.host,
        "Starting weather bridge"
    );

    let connection =
        match MqttConnection::establish(&settings.mqtt, &identity, &topics, MQTT_CONNECT_WAIT).await
        {
            Ok(connection) => connection,
            Err(e) => {
                error!(error = %e, "Failed to connect to MQTT broker");
                process::exit(1);
            }
        };

    let publisher = HAPublisher::new(
        Box::new(connection.client()),
        topics,
        identity,
        units,
    );
    let mut bridge = WeatherBridge::new(publisher, units, timezone, connection.state());

    if settings.wu.enabled() {
        match WundergroundRelay::new(&settings.wu) {
            Ok(relay) => {
                info!("Weather Underground forwarding enabled");
                bridge = bridge.with_relay(Arc::new(relay));
            }
            Err(e) => warn!(error = %e, "Failed to set up Weather Underground forwarding, disabling it"),
        }
    }

    let app = router(AppState {
        bridge: Arc::new(bridge),
        connection: connection.state(),
    });

    let bind = settings.http.bind();
    let listener = match tokio::net::TcpListener::bind(bind).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(bind = %bind, error = %e, "Failed to bind HTTP listener");
            connection.shutdown().await;
            process::exit(1);
        }
    };
    info!(bind = %bind, "Listening for weather station uploads");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "HTTP server failed");
    }

    connection.shutdown().await;
    info!("Weather bridge stopped");
}
