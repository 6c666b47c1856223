use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    sync::{atomic::AtomicBool, Arc, Mutex},
    time::{Duration, Instant},
};

use rumqttc::{Client, Event, MqttOptions, Packet, Publish, QoS};
use tracing::info;

/// Stands in for Home Assistant: subscribes to the discovery prefix and records everything.
pub struct CollectingClient {
    received_messages: Arc<Mutex<Vec<Publish>>>,
    join_handle: Option<std::thread::JoinHandle<()>>,
    terminate_flag: Arc<AtomicBool>,
}

impl CollectingClient {
    pub fn new() -> Self {
        Self {
            received_messages: Arc::new(Mutex::new(Vec::new())),
            join_handle: None,
            terminate_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn start(&mut self, host: &str, port: u16, filter: &str) {
        let options = MqttOptions::new("collecting-client", host, port);
        let filter = filter.to_owned();
        let received_messages = self.received_messages.clone();
        let stopping_flag = Arc::clone(&self.terminate_flag);
        let (tx, rx) = std::sync::mpsc::channel::<()>();

        let handle = std::thread::spawn(move || {
            let (client, mut connection) = Client::new(options, 100);
            client.subscribe(filter, QoS::AtLeastOnce).unwrap();

            loop {
                let message = connection.recv_timeout(Duration::from_secs(1));
                info!("Received message: {:?}", &message);
                match message {
                    Ok(Ok(Event::Incoming(Packet::SubAck(_)))) => {
                        tx.send(()).expect("Cannot report ready to main thread")
                    }
                    Ok(Ok(Event::Incoming(Packet::Publish(message)))) => {
                        received_messages.lock().unwrap().push(message);
                    }
                    _ => {}
                }

                if stopping_flag.load(std::sync::atomic::Ordering::Relaxed) {
                    info!("Collecting client is terminating");
                    break;
                }
            }
        });

        rx.recv().expect("Collecting client did not report ready");
        self.join_handle = Some(handle);
    }

    pub fn wait_for_messages(
        self,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<Publish>, WaitError> {
        let start = Instant::now();
        loop {
            if self.received_messages.lock().unwrap().len() >= count || start.elapsed() > timeout {
                self.terminate_flag
                    .store(true, std::sync::atomic::Ordering::Relaxed);
                break;
            }

            std::thread::sleep(Duration::from_millis(500));
        }

        if let Some(handle) = self.join_handle {
            handle.join().unwrap();
        }

        let inner_mutex =
            Arc::try_unwrap(self.received_messages).expect("More than one reference detected");
        let received_messages = inner_mutex.into_inner().unwrap();

        match received_messages.len().cmp(&count) {
            Ordering::Equal => Ok(received_messages),
            Ordering::Greater => Err(WaitError::TooMany(received_messages)),
            Ordering::Less => Err(WaitError::Timeout(received_messages)),
        }
    }
}

#[derive(Debug)]
pub enum WaitError {
    Timeout(Vec<Publish>),
    TooMany(Vec<Publish>),
}

impl Display for WaitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (label, publishes) = match self {
            WaitError::Timeout(publishes) => ("Timeout", publishes),
            WaitError::TooMany(publishes) => ("TooMany", publishes),
        };

        write!(f, "{label}: [")?;
        for publish in publishes {
            writeln!(
                f,
                "({} : {}), ",
                publish.topic,
                String::from_utf8_lossy(&publish.payload)
            )?;
        }
        write!(f, "]")
    }
}
